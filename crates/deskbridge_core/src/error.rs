//! Error types for the staging core.

use crate::object_type::ObjectType;
use thiserror::Error;

/// Result type for staging operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in staging operations.
///
/// Batch operations do not surface per-record problems through this type;
/// those are collected into the operation's report so siblings keep
/// processing. `CoreError` is reserved for failures of the operation
/// itself, chiefly the store becoming unreachable.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Object store error.
    #[error("storage error: {0}")]
    Storage(#[from] deskbridge_storage::StorageError),

    /// Payload codec error.
    #[error("codec error: {0}")]
    Codec(#[from] deskbridge_codec::CodecError),

    /// The record carries no value in its identity field.
    #[error("record has no natural key for type {object_type}")]
    MissingNaturalKey {
        /// The type whose extractor came up empty.
        object_type: ObjectType,
    },

    /// The natural key exceeds the destination's identifier field limit.
    #[error("natural key {natural_key:?} for type {object_type} exceeds {limit} characters")]
    KeyTooLong {
        /// The rejected record's type.
        object_type: ObjectType,
        /// The over-long key.
        natural_key: String,
        /// The destination-imposed bound.
        limit: usize,
    },

    /// No session snapshot exists under the given identifier.
    #[error("session not found: {session_id}")]
    SessionNotFound {
        /// The identifier that did not resolve.
        session_id: String,
    },
}

impl CoreError {
    /// Creates a session not found error.
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }
}
