//! Outcome notifications and their reconciliation grouping.

use crate::object_type::ObjectType;
use std::collections::BTreeMap;
use std::fmt;

/// Payload field carrying an explicit outcome message.
pub const MESSAGE_FIELD: &str = "message";

/// Terminal status a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationStatus {
    /// The destination accepted the record.
    Processed,
    /// The record was rejected, by validation or by the destination.
    Failed,
}

impl NotificationStatus {
    /// The token used in notification storage keys.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            NotificationStatus::Processed => "processed",
            NotificationStatus::Failed => "failed",
        }
    }

    /// Resolves a storage-key token back to a status.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "processed" => Some(NotificationStatus::Processed),
            "failed" => Some(NotificationStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Message used for accepted records that carry no explicit message.
#[must_use]
pub fn success_message(object_type: ObjectType) -> String {
    format!(
        "{} successfully sent to the accounting system",
        object_type.singular()
    )
}

/// Notifications drained from the ready stage, grouped for the origin.
///
/// Within each status, object references are accumulated under their
/// message text, so the origin receives one entry per distinct outcome
/// rather than one per record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationSummary {
    /// Accepted records: message -> affected natural keys.
    pub processed: BTreeMap<String, Vec<String>>,
    /// Rejected records: message -> affected natural keys.
    pub failed: BTreeMap<String, Vec<String>>,
}

impl NotificationSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files one notification under its status and message.
    pub fn add(
        &mut self,
        status: NotificationStatus,
        message: impl Into<String>,
        object_ref: impl Into<String>,
    ) {
        let group = match status {
            NotificationStatus::Processed => &mut self.processed,
            NotificationStatus::Failed => &mut self.failed,
        };
        group.entry(message.into()).or_default().push(object_ref.into());
    }

    /// True if no notifications were drained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && self.failed.is_empty()
    }

    /// Total number of object references across both statuses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processed
            .values()
            .chain(self.failed.values())
            .map(Vec::len)
            .sum()
    }
}
