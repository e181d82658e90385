//! Inputs and outputs of the batch staging operations.
//!
//! Batch operations never abort on a single bad record (partial failure is
//! the normal case when the destination answers out of order), so each one
//! returns a report listing what succeeded and what was skipped.

use crate::object_type::ObjectType;
use deskbridge_codec::Record;

/// A reference to one staged record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// The record's type.
    pub object_type: ObjectType,
    /// The record's natural key.
    pub natural_key: String,
    /// Destination list id, when the destination has issued one.
    pub list_id: Option<String>,
    /// Destination edit sequence, when known.
    pub edit_sequence: Option<String>,
}

impl ObjectRef {
    /// Creates a reference without destination ids.
    pub fn new(object_type: ObjectType, natural_key: impl Into<String>) -> Self {
        Self {
            object_type,
            natural_key: natural_key.into(),
            list_id: None,
            edit_sequence: None,
        }
    }

    /// Attaches destination-issued ids.
    #[must_use]
    pub fn with_ids(mut self, list_id: impl Into<String>, edit_sequence: impl Into<String>) -> Self {
        self.list_id = Some(list_id.into());
        self.edit_sequence = Some(edit_sequence.into());
        self
    }

    /// The single "has destination id" predicate.
    ///
    /// The destination id is present exactly when `list_id` holds a
    /// non-empty value. Every call site uses this predicate; emptiness is
    /// never tested ad hoc.
    #[must_use]
    pub fn has_destination_id(&self) -> bool {
        self.list_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// One destination-issued identity to attach to a ready record.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationIdUpdate {
    /// The record's type.
    pub object_type: ObjectType,
    /// The record's natural key.
    pub natural_key: String,
    /// The id the destination assigned.
    pub list_id: String,
    /// The destination's edit sequence for the record.
    pub edit_sequence: String,
    /// Extra destination-supplied fields to fold into the payload.
    pub extra: Option<Record>,
}

impl DestinationIdUpdate {
    /// Creates an update without extra payload data.
    pub fn new(
        object_type: ObjectType,
        natural_key: impl Into<String>,
        list_id: impl Into<String>,
        edit_sequence: impl Into<String>,
    ) -> Self {
        Self {
            object_type,
            natural_key: natural_key.into(),
            list_id: list_id.into(),
            edit_sequence: edit_sequence.into(),
            extra: None,
        }
    }

    /// Attaches extra payload data.
    #[must_use]
    pub fn with_extra(mut self, extra: Record) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Terminal outcomes reported by the destination, grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcomes {
    /// Records the destination accepted.
    pub processed: Vec<ObjectRef>,
    /// Records the destination rejected.
    pub failed: Vec<ObjectRef>,
}

impl Outcomes {
    /// Creates an empty outcome set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes with only processed references.
    #[must_use]
    pub fn processed(refs: Vec<ObjectRef>) -> Self {
        Self {
            processed: refs,
            failed: Vec::new(),
        }
    }

    /// Outcomes with only failed references.
    #[must_use]
    pub fn failed(refs: Vec<ObjectRef>) -> Self {
        Self {
            processed: Vec::new(),
            failed: refs,
        }
    }
}

/// A record handed to the external request builder.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCandidate {
    /// The record's type.
    pub object_type: ObjectType,
    /// The decoded payload, destination ids merged in when known.
    pub record: Record,
}

/// One record skipped by a batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The record's type.
    pub object_type: ObjectType,
    /// The natural key, when one could be extracted.
    pub natural_key: Option<String>,
    /// Why the record was skipped.
    pub reason: String,
}

/// What [`crate::StagingEngine::save`] did with a batch.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    /// Keys written, dependents included, in write order.
    pub staged: Vec<String>,
    /// Records skipped by validation.
    pub rejected: Vec<Rejection>,
}

impl SaveReport {
    /// True if every record (and synthesized dependent) was staged.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// What [`crate::StagingEngine::update_with_destination_ids`] did.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// The ready-stage keys records now live under.
    pub updated: Vec<String>,
    /// References with no matching ready record.
    pub missing: Vec<ObjectRef>,
}

/// What [`crate::StagingEngine::finalize`] did.
#[derive(Debug, Clone, Default)]
pub struct FinalizeReport {
    /// Keys now in a terminal stage.
    pub relocated: Vec<String>,
    /// Notification keys created for processed records.
    pub notifications: Vec<String>,
    /// References with no matching ready record.
    pub missing: Vec<ObjectRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_id_predicate() {
        let bare = ObjectRef::new(ObjectType::Order, "ORD-1");
        assert!(!bare.has_destination_id());

        let with_ids = ObjectRef::new(ObjectType::Order, "ORD-1").with_ids("800000-1", "2");
        assert!(with_ids.has_destination_id());

        let empty_id = ObjectRef {
            list_id: Some(String::new()),
            ..ObjectRef::new(ObjectType::Order, "ORD-1")
        };
        assert!(!empty_id.has_destination_id());
    }

    #[test]
    fn outcome_constructors() {
        let refs = vec![ObjectRef::new(ObjectType::Order, "ORD-1")];
        assert_eq!(Outcomes::processed(refs.clone()).processed.len(), 1);
        assert!(Outcomes::processed(refs.clone()).failed.is_empty());
        assert_eq!(Outcomes::failed(refs).failed.len(), 1);
    }
}
