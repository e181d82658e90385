//! Staging fixtures with automatic cleanup.

use deskbridge_core::{Namespace, StagingEngine};
use deskbridge_storage::{FileStore, InMemoryStore};
use std::sync::Arc;
use tempfile::TempDir;

/// Connection id used by all fixtures.
pub const TEST_CONNECTION: &str = "test-connection";

/// A staging engine with automatic cleanup.
pub struct TestStaging {
    /// The engine under test.
    pub engine: StagingEngine,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStaging {
    /// Creates an engine over a fresh in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            engine: StagingEngine::new(
                Arc::new(InMemoryStore::new()),
                Namespace::new(TEST_CONNECTION),
            ),
            _temp_dir: None,
        }
    }

    /// Creates an engine over a file store in a temporary directory.
    #[must_use]
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");

        Self {
            engine: StagingEngine::new(Arc::new(store), Namespace::new(TEST_CONNECTION)),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Creates an in-memory engine with a customized namespace.
    #[must_use]
    pub fn with_namespace(namespace: Namespace) -> Self {
        Self {
            engine: StagingEngine::new(Arc::new(InMemoryStore::new()), namespace),
            _temp_dir: None,
        }
    }
}

impl std::ops::Deref for TestStaging {
    type Target = StagingEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test against a fresh in-memory staging area.
///
/// # Example
///
/// ```rust,ignore
/// use deskbridge_testkit::with_staging;
///
/// #[test]
/// fn my_test() {
///     with_staging(|engine| {
///         // ... staging operations
///     });
/// }
/// ```
pub fn with_staging<F, R>(f: F) -> R
where
    F: FnOnce(&StagingEngine) -> R,
{
    let staging = TestStaging::memory();
    f(&staging.engine)
}

/// Runs a test against a temporary file-backed staging area.
pub fn with_file_staging<F, R>(f: F) -> R
where
    F: FnOnce(&StagingEngine) -> R,
{
    let staging = TestStaging::file();
    f(&staging.engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records;
    use deskbridge_core::{ObjectType, Stage};

    #[test]
    fn memory_fixture_starts_empty() {
        let staging = TestStaging::memory();
        for stage in Stage::ALL {
            assert!(staging.list_stage(stage).unwrap().is_empty());
        }
    }

    #[test]
    fn file_fixture_persists_within_test() {
        with_file_staging(|engine| {
            engine
                .save(ObjectType::Product, &[records::product("SKU-1")])
                .unwrap();
            assert_eq!(engine.list_stage(Stage::Pending).unwrap().len(), 1);
        });
    }
}
