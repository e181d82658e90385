//! # DeskBridge Storage
//!
//! Object store adapter for DeskBridge.
//!
//! This crate provides the lowest-level storage abstraction for the staging
//! pipeline. Stores are **opaque key/blob maps** - they do not interpret
//! the data they hold, and they do not understand stages, record types, or
//! the key naming convention layered on top by `deskbridge_core`.
//!
//! ## Design Principles
//!
//! - Stores never silently overwrite: a write to an occupied key succeeds
//!   under a disambiguated key, and the key actually used is returned
//! - The only query primitive is prefix listing
//! - Renames are atomic: a move either fully succeeds or fails
//! - Stores must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral staging
//! - [`FileStore`] - Directory-backed persistent storage
//!
//! ## Example
//!
//! ```rust
//! use deskbridge_storage::{InMemoryStore, ObjectStore};
//!
//! let store = InMemoryStore::new();
//! let key = store.write("inbox/orders_A_.cbor", b"payload").unwrap();
//! assert_eq!(key, "inbox/orders_A_.cbor");
//! assert_eq!(store.read(&key).unwrap(), b"payload");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::{MoveOutcome, ObjectStore};
