//! Session snapshots for asynchronous reply correlation.

use crate::error::CoreResult;
use crate::namespace::Namespace;
use crate::paths::KeyLayout;
use deskbridge_codec::{decode_first_record, encode_record, Record};
use deskbridge_storage::ObjectStore;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Stores the record context of in-flight destination requests.
///
/// The destination answers asynchronously and out of order, carrying
/// nothing but a session identifier; the snapshot saved here is how the
/// reply handler recovers the full record it was about.
///
/// Sessions are written once and never mutated. Loading does not delete -
/// callers that treat a session as single-use must [`SessionStore::delete`]
/// it explicitly after consuming the content, or the session prefix grows
/// without bound.
pub struct SessionStore {
    store: Arc<dyn ObjectStore>,
    layout: KeyLayout,
}

impl SessionStore {
    /// Creates a session store for a namespace.
    pub fn new(store: Arc<dyn ObjectStore>, namespace: &Namespace) -> Self {
        Self {
            store,
            layout: KeyLayout::new(namespace),
        }
    }

    /// Persists a snapshot and returns its fresh session id.
    ///
    /// The optional `tag` disambiguates two in-flight requests snapshotting
    /// the same record (a shipment expressed both as itself and as its
    /// derived order); it becomes part of the returned id.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the store write fails.
    pub fn save(&self, record: &Record, tag: Option<&str>) -> CoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let session_id = match tag {
            Some(tag) => format!("{id}_{tag}"),
            None => id,
        };

        let key = self.layout.session_key(&session_id);
        self.store.write(&key, &encode_record(record)?)?;
        debug!(%session_id, %key, "session saved");
        Ok(session_id)
    }

    /// Loads the snapshot saved under `session_id`.
    ///
    /// Returns `None` for an unknown id; the caller decides whether that is
    /// an error (a reply about a request this process never sent usually
    /// is not).
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails for any reason other than
    /// absence, or if the snapshot does not decode.
    pub fn load(&self, session_id: &str) -> CoreResult<Option<Record>> {
        let key = self.layout.session_key(session_id);
        match self.store.read(&key) {
            Ok(bytes) => Ok(Some(decode_first_record(&bytes)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes the snapshot saved under `session_id`.
    ///
    /// Deleting an already-deleted session is not an error, so reply
    /// handlers can consume idempotently.
    ///
    /// # Errors
    ///
    /// Returns an error if the store delete fails for any reason other
    /// than absence.
    pub fn delete(&self, session_id: &str) -> CoreResult<()> {
        let key = self.layout.session_key(session_id);
        match self.store.delete(&key) {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("prefix", &self.layout.sessions_prefix())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskbridge_storage::InMemoryStore;

    fn store() -> (Arc<InMemoryStore>, SessionStore) {
        let memory = Arc::new(InMemoryStore::new());
        let sessions = SessionStore::new(memory.clone(), &Namespace::new("conn-1"));
        (memory, sessions)
    }

    fn snapshot() -> Record {
        let mut record = Record::new();
        record.set("id", "ORD-1");
        record.set("status", "shipped");
        record
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_, sessions) = store();
        let record = snapshot();

        let id = sessions.save(&record, None).unwrap();
        assert_eq!(sessions.load(&id).unwrap(), Some(record));
    }

    #[test]
    fn tag_becomes_part_of_the_id() {
        let (_, sessions) = store();

        let id = sessions.save(&snapshot(), Some("as-order")).unwrap();
        assert!(id.ends_with("_as-order"));
        assert!(sessions.load(&id).unwrap().is_some());
    }

    #[test]
    fn ids_are_unique_per_save() {
        let (_, sessions) = store();
        let record = snapshot();

        let first = sessions.save(&record, None).unwrap();
        let second = sessions.save(&record, None).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn load_unknown_is_none() {
        let (_, sessions) = store();
        assert_eq!(sessions.load("no-such-session").unwrap(), None);
    }

    #[test]
    fn load_does_not_consume() {
        let (_, sessions) = store();
        let id = sessions.save(&snapshot(), None).unwrap();

        assert!(sessions.load(&id).unwrap().is_some());
        assert!(sessions.load(&id).unwrap().is_some());
    }

    #[test]
    fn delete_is_idempotent() {
        let (memory, sessions) = store();
        let id = sessions.save(&snapshot(), None).unwrap();

        sessions.delete(&id).unwrap();
        assert_eq!(sessions.load(&id).unwrap(), None);
        sessions.delete(&id).unwrap();
        assert!(memory.is_empty());
    }

    #[test]
    fn sessions_live_under_their_own_prefix() {
        let (memory, sessions) = store();
        sessions.save(&snapshot(), None).unwrap();

        let keys = memory.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("conn-1/primary_sessions/"));
        assert!(keys[0].ends_with(".cbor"));
    }
}
