//! CLI command implementations.

pub mod inspect;
pub mod notifications;
pub mod promote;

use deskbridge_core::{Namespace, StagingEngine};
use deskbridge_storage::FileStore;
use std::path::Path;
use std::sync::Arc;

/// Opens an engine over the file-backed store at `root`.
pub(crate) fn open_engine(
    root: &Path,
    namespace: Namespace,
) -> Result<StagingEngine, Box<dyn std::error::Error>> {
    let store = FileStore::open(root)?;
    Ok(StagingEngine::new(Arc::new(store), namespace))
}
