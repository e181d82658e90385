//! In-memory object store for testing.

use crate::error::{StorageError, StorageResult};
use crate::store::{suffixed_key, MoveOutcome, ObjectStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory object store.
///
/// This store keeps all blobs in a sorted map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral staging areas that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use deskbridge_storage::{InMemoryStore, ObjectStore};
///
/// let store = InMemoryStore::new();
/// store.write("a/b_1_.cbor", b"one").unwrap();
/// store.write("a/b_2_.cbor", b"two").unwrap();
/// assert_eq!(store.list_prefix("a/b_").unwrap().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of blobs currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns true if the store holds no blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Returns every key in the store.
    ///
    /// Useful for test assertions.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }

    /// Removes every blob from the store.
    pub fn clear(&self) {
        self.blobs.write().clear();
    }

    /// First free variant of `key` while holding the map lock.
    fn free_key(blobs: &BTreeMap<String, Vec<u8>>, key: &str) -> (String, bool) {
        if !blobs.contains_key(key) {
            return (key.to_string(), false);
        }
        let mut n = 1;
        loop {
            let candidate = suffixed_key(key, n);
            if !blobs.contains_key(&candidate) {
                return (candidate, true);
            }
            n += 1;
        }
    }
}

impl ObjectStore for InMemoryStore {
    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<String> {
        let mut blobs = self.blobs.write();
        let (actual, _) = Self::free_key(&blobs, key);
        blobs.insert(actual.clone(), bytes.to_vec());
        Ok(actual)
    }

    fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let blobs = self.blobs.read();
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<MoveOutcome> {
        let mut blobs = self.blobs.write();
        let bytes = blobs
            .remove(from)
            .ok_or_else(|| StorageError::not_found(from))?;

        let (actual, suffixed) = Self::free_key(&blobs, to);
        blobs.insert(actual.clone(), bytes);

        Ok(if suffixed {
            MoveOutcome::Suffixed(actual)
        } else {
            MoveOutcome::Exact(actual)
        })
    }

    fn copy(&self, from: &str, to: &str) -> StorageResult<String> {
        let mut blobs = self.blobs.write();
        let bytes = blobs
            .get(from)
            .cloned()
            .ok_or_else(|| StorageError::not_found(from))?;

        let (actual, _) = Self::free_key(&blobs, to);
        blobs.insert(actual.clone(), bytes);
        Ok(actual)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.blobs
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(key))
    }
}
