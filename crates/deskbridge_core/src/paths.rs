//! Storage key derivation and parsing.
//!
//! Every key the pipeline writes follows one convention:
//!
//! ```text
//! {connection_id}/{origin}_{stage}/{plural_type}_{natural_key}_{list_id}_{edit_sequence}.cbor
//! ```
//!
//! with trailing tokens omitted while unknown, and a
//! `notification_{status}_` prefix inserted after the stage segment for
//! notification records. Components reading raw storage keys depend on this
//! layout bit-exactly, so the physical string is derived here and nowhere
//! else; the rest of the crate works in terms of `(stage, type, key)`.

use crate::namespace::Namespace;
use crate::notification::NotificationStatus;
use crate::object_type::ObjectType;
use crate::stage::Stage;
use deskbridge_codec::FILE_EXTENSION;

/// Derives storage keys for one namespace.
///
/// Pure string derivation, no state beyond the namespace identity.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    connection_id: String,
    origin: String,
}

impl KeyLayout {
    /// Creates the layout for a namespace.
    #[must_use]
    pub fn new(namespace: &Namespace) -> Self {
        Self {
            connection_id: namespace.connection_id.clone(),
            origin: namespace.origin.clone(),
        }
    }

    /// The folder-like prefix holding a stage, without trailing slash.
    #[must_use]
    pub fn stage_prefix(&self, stage: Stage) -> String {
        format!("{}/{}_{}", self.connection_id, self.origin, stage.dir())
    }

    /// The prefix listing every blob in a stage.
    #[must_use]
    pub fn stage_contents_prefix(&self, stage: Stage) -> String {
        format!("{}/", self.stage_prefix(stage))
    }

    /// The prefix holding session snapshots.
    #[must_use]
    pub fn sessions_prefix(&self) -> String {
        format!("{}/{}_sessions", self.connection_id, self.origin)
    }

    /// Key for a record without destination ids.
    #[must_use]
    pub fn record_key(&self, stage: Stage, ty: ObjectType, natural_key: &str) -> String {
        format!(
            "{}/{}_{}_.{}",
            self.stage_prefix(stage),
            ty.plural(),
            natural_key,
            FILE_EXTENSION
        )
    }

    /// Key for a record carrying destination-issued ids.
    #[must_use]
    pub fn record_key_with_ids(
        &self,
        stage: Stage,
        ty: ObjectType,
        natural_key: &str,
        list_id: &str,
        edit_sequence: &str,
    ) -> String {
        format!(
            "{}/{}_{}_{}_{}.{}",
            self.stage_prefix(stage),
            ty.plural(),
            natural_key,
            list_id,
            edit_sequence,
            FILE_EXTENSION
        )
    }

    /// Prefix locating one record regardless of its trailing tokens.
    #[must_use]
    pub fn record_prefix(&self, stage: Stage, ty: ObjectType, natural_key: &str) -> String {
        format!("{}/{}_{}_", self.stage_prefix(stage), ty.plural(), natural_key)
    }

    /// Prefix locating every record of a type within a stage.
    #[must_use]
    pub fn type_prefix(&self, stage: Stage, ty: ObjectType) -> String {
        format!("{}/{}_", self.stage_prefix(stage), ty.plural())
    }

    /// Key for a timestamped multi-record batch blob.
    #[must_use]
    pub fn batch_key(&self, stage: Stage, ty: ObjectType, timestamp: u64) -> String {
        format!(
            "{}/{}_{}.{}",
            self.stage_prefix(stage),
            ty.plural(),
            timestamp,
            FILE_EXTENSION
        )
    }

    /// Key for a notification record in the ready stage.
    #[must_use]
    pub fn notification_key(
        &self,
        status: NotificationStatus,
        ty: ObjectType,
        natural_key: &str,
    ) -> String {
        format!(
            "{}/notification_{}_{}_{}_.{}",
            self.stage_prefix(Stage::Ready),
            status.token(),
            ty.plural(),
            natural_key,
            FILE_EXTENSION
        )
    }

    /// Notification key wrapping an existing record file name.
    ///
    /// Used when a finalized record is copied into its notification: the
    /// terminal file name (destination ids included) is preserved behind
    /// the `notification_{status}_` marker.
    #[must_use]
    pub fn notification_key_for(&self, status: NotificationStatus, record_filename: &str) -> String {
        format!(
            "{}/notification_{}_{}",
            self.stage_prefix(Stage::Ready),
            status.token(),
            record_filename
        )
    }

    /// Prefix listing every undrained notification.
    #[must_use]
    pub fn notification_prefix(&self) -> String {
        format!("{}/notification_", self.stage_prefix(Stage::Ready))
    }

    /// Key for a session snapshot.
    #[must_use]
    pub fn session_key(&self, session_id: &str) -> String {
        format!("{}/{}.{}", self.sessions_prefix(), session_id, FILE_EXTENSION)
    }

    /// Re-keys a blob into another stage, preserving its file name.
    #[must_use]
    pub fn relocated(&self, key: &str, to: Stage) -> String {
        format!("{}/{}", self.stage_prefix(to), filename(key))
    }
}

/// The file name portion of a key (after the last slash).
#[must_use]
pub fn filename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// A record file name taken apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecordKey {
    /// The record's type, from the plural token.
    pub object_type: ObjectType,
    /// The natural key token.
    pub natural_key: String,
    /// Destination list id, when the record has been updated with one.
    pub list_id: Option<String>,
    /// Destination edit sequence, when known.
    pub edit_sequence: Option<String>,
}

/// Strips the extension and any store collision suffix `(n)` from a file
/// name, leaving the underscore-separated token stem.
fn token_stem(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(&format!(".{FILE_EXTENSION}"))?;

    // The store disambiguates collisions by appending "(n)" to the stem;
    // the tokens of interest sit before it.
    if let Some(open) = stem.rfind('(') {
        if stem.ends_with(')') && stem[open + 1..stem.len() - 1].chars().all(|c| c.is_ascii_digit())
        {
            return Some(&stem[..open]);
        }
    }
    Some(stem)
}

/// Parses a record file name (`orders_ORD-1_.cbor`,
/// `orders_ORD-1_800000-1_1.cbor`, `orders_1431461670.cbor`).
///
/// Returns `None` when the name does not follow the record convention.
#[must_use]
pub fn parse_record_filename(name: &str) -> Option<ParsedRecordKey> {
    let stem = token_stem(name)?;
    let mut tokens = stem.split('_');

    let object_type = ObjectType::from_plural(tokens.next()?)?;
    let natural_key = tokens.next().filter(|t| !t.is_empty())?.to_string();
    let list_id = tokens.next().filter(|t| !t.is_empty()).map(str::to_string);
    let edit_sequence = tokens.next().filter(|t| !t.is_empty()).map(str::to_string);

    Some(ParsedRecordKey {
        object_type,
        natural_key,
        list_id,
        edit_sequence,
    })
}

/// A notification file name taken apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNotificationKey {
    /// The terminal status the notification reports.
    pub status: NotificationStatus,
    /// The type of the record the notification is about.
    pub object_type: ObjectType,
    /// The affected record's natural key.
    pub object_ref: String,
}

/// Parses a notification file name
/// (`notification_processed_orders_ORD-1_800000-1_1.cbor`).
#[must_use]
pub fn parse_notification_filename(name: &str) -> Option<ParsedNotificationKey> {
    let stem = token_stem(name)?;
    let rest = stem.strip_prefix("notification_")?;
    let mut tokens = rest.split('_');

    let status = NotificationStatus::from_token(tokens.next()?)?;
    let object_type = ObjectType::from_plural(tokens.next()?)?;
    let object_ref = tokens.next().filter(|t| !t.is_empty())?.to_string();

    Some(ParsedNotificationKey {
        status,
        object_type,
        object_ref,
    })
}
