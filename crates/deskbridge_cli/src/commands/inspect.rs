//! Inspect command implementation.

use deskbridge_core::{Namespace, Stage};
use std::path::Path;

/// Runs the inspect command.
pub fn run(
    root: &Path,
    namespace: Namespace,
    show_keys: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine(root, namespace)?;

    println!(
        "Staging area {} (origin {})",
        engine.namespace().connection_id,
        engine.namespace().origin
    );

    for stage in Stage::ALL {
        let keys = engine.list_stage(stage)?;
        println!("  {:<18} {:>6}", stage.dir(), keys.len());
        if show_keys {
            for key in keys {
                println!("    {key}");
            }
        }
    }

    Ok(())
}
