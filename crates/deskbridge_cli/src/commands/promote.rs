//! Promote command implementation.

use deskbridge_core::Namespace;
use std::path::Path;

/// Runs the two-phase promotion sweep.
pub fn run(root: &Path, namespace: Namespace) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine(root, namespace)?;
    let promoted = engine.promote_two_phase()?;
    println!("Promoted {promoted} two-phase record(s) into pending");
    Ok(())
}
