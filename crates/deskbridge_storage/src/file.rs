//! Directory-backed object store for persistent staging.

use crate::error::{StorageError, StorageResult};
use crate::store::{suffixed_key, MoveOutcome, ObjectStore};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// A directory-backed object store.
///
/// Keys are slash-separated relative paths under a root directory
/// (`{connection}/{stage}/{file}`), so the staging layout is directly
/// inspectable with ordinary filesystem tools. Data survives process
/// restarts.
///
/// # Thread Safety
///
/// This store is thread-safe. A mutation lock serializes the
/// check-then-rename sequences so collision disambiguation stays
/// race-free within the process.
///
/// # Example
///
/// ```no_run
/// use deskbridge_storage::{FileStore, ObjectStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("staging")).unwrap();
/// store.write("conn-1/primary_pending/orders_A_.cbor", b"payload").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    mutate: Mutex<()>,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created, or if the
    /// path exists and is not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        if root.exists() {
            if !root.is_dir() {
                return Err(StorageError::unavailable(format!(
                    "store root is not a directory: {}",
                    root.display()
                )));
            }
        } else {
            fs::create_dir_all(root)?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            mutate: Mutex::new(()),
        })
    }

    /// Returns the root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn abs(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    /// First free variant of `key` on disk.
    fn free_key(&self, key: &str) -> (String, bool) {
        if !self.abs(key).exists() {
            return (key.to_string(), false);
        }
        let mut n = 1;
        loop {
            let candidate = suffixed_key(key, n);
            if !self.abs(&candidate).exists() {
                return (candidate, true);
            }
            n += 1;
        }
    }

    fn create_parent(&self, key: &str) -> StorageResult<()> {
        if let Some(parent) = self.abs(key).parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Collects every file key under `dir` (relative to the root).
    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> StorageResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, out)?;
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for FileStore {
    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<String> {
        let _guard = self.mutate.lock();
        self.create_parent(key)?;
        let (actual, _) = self.free_key(key);
        fs::write(self.abs(&actual), bytes)?;
        Ok(actual)
    }

    fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // The deepest directory named by the prefix bounds the walk; the
        // remainder of the prefix filters file names within it.
        let dir = match prefix.rfind('/') {
            Some(slash) => self.abs(&prefix[..slash]),
            None => self.root.clone(),
        };

        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        self.walk(&dir, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        match fs::read(self.abs(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<MoveOutcome> {
        let _guard = self.mutate.lock();
        if !self.abs(from).exists() {
            return Err(StorageError::not_found(from));
        }
        self.create_parent(to)?;

        let (actual, suffixed) = self.free_key(to);
        fs::rename(self.abs(from), self.abs(&actual))?;

        Ok(if suffixed {
            MoveOutcome::Suffixed(actual)
        } else {
            MoveOutcome::Exact(actual)
        })
    }

    fn copy(&self, from: &str, to: &str) -> StorageResult<String> {
        let _guard = self.mutate.lock();
        if !self.abs(from).exists() {
            return Err(StorageError::not_found(from));
        }
        self.create_parent(to)?;

        let (actual, _) = self.free_key(to);
        fs::copy(self.abs(from), self.abs(&actual))?;
        Ok(actual)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let _guard = self.mutate.lock();
        match fs::remove_file(self.abs(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key))
            }
            Err(err) => Err(err.into()),
        }
    }
}
