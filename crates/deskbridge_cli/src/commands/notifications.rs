//! Notifications command implementation.

use deskbridge_core::{Namespace, ObjectType};
use std::path::Path;

/// Drains and prints outcome notifications for one object type.
///
/// This is a destructive read: drained notifications will not be returned
/// again, here or to any other consumer.
pub fn run(
    root: &Path,
    namespace: Namespace,
    object_type: ObjectType,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::open_engine(root, namespace)?;
    let summary = engine.collect_notifications(object_type)?;

    if summary.is_empty() {
        println!("No notifications for {}", object_type.plural());
        return Ok(());
    }

    for (label, group) in [("processed", &summary.processed), ("failed", &summary.failed)] {
        if group.is_empty() {
            continue;
        }
        println!("{label}:");
        for (message, refs) in group {
            println!("  {message}");
            for object_ref in refs {
                println!("    - {object_ref}");
            }
        }
    }

    Ok(())
}
