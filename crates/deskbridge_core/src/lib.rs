//! # DeskBridge Core
//!
//! The staging state machine relaying business records between an origin
//! system that pushes continuously and a destination accounting application
//! reachable only through short, periodic polling sessions.
//!
//! Records live in a durable object store as a folder-prefix state machine:
//!
//! ```text
//! pending -> (two_phase_pending -> pending) -> ready -> processed | failed
//! ```
//!
//! The [`StagingEngine`] owns every stage transition. Composite records are
//! expanded into their dependents ahead of themselves so the destination's
//! referential-order rules hold; replies that arrive much later are
//! correlated back through [`SessionStore`] snapshots; terminal outcomes
//! flow back to the origin as grouped [`NotificationSummary`] batches.
//!
//! ## Example
//!
//! ```
//! use deskbridge_codec::Record;
//! use deskbridge_core::{Namespace, ObjectType, StagingEngine};
//! use deskbridge_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let engine = StagingEngine::new(
//!     Arc::new(InMemoryStore::new()),
//!     Namespace::new("54372cb069702d1f59000000"),
//! );
//!
//! let mut product = Record::new();
//! product.set("id", "T-SHIRT-1");
//! engine.save(ObjectType::Product, &[product]).unwrap();
//!
//! let candidates = engine.list_pending_for_dispatch().unwrap();
//! assert_eq!(candidates.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod namespace;
mod notification;
mod object_type;
mod paths;
mod report;
mod session;
mod stage;
mod two_phase;

pub use engine::{select_with_precedence, StagingEngine};
pub use error::{CoreError, CoreResult};
pub use namespace::{Flow, Namespace, DEFAULT_ORIGIN};
pub use notification::{
    success_message, NotificationStatus, NotificationSummary, MESSAGE_FIELD,
};
pub use object_type::{ObjectType, NATURAL_KEY_LIMIT};
pub use paths::{
    filename, parse_notification_filename, parse_record_filename, KeyLayout,
    ParsedNotificationKey, ParsedRecordKey,
};
pub use report::{
    DestinationIdUpdate, DispatchCandidate, FinalizeReport, ObjectRef, Outcomes, Rejection,
    SaveReport, UpdateReport,
};
pub use session::SessionStore;
pub use stage::Stage;

/// Crate version, for tooling banners.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
