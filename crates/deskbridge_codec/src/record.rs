//! Record field map.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One business record: a string-keyed map of payload fields.
///
/// Records are schemaless by design. The staging pipeline only ever
/// inspects a handful of well-known fields (`id`, `email`, `status`, ...);
/// everything else passes through untouched for the request builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Looks up a text field.
    #[must_use]
    pub fn get_text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_text)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Folds every field of `other` into this record.
    ///
    /// Colliding fields take the incoming value; this is the semantics used
    /// when destination-supplied extra data is merged into a staged payload.
    pub fn merge(&mut self, other: Record) {
        for (field, value) in other.0 {
            self.0.insert(field, value);
        }
    }

    /// Iterates over the fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self(fields)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Map(record.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    /// A map value becomes a record; any other value is handed back.
    fn try_from(value: Value) -> Result<Self, Value> {
        match value {
            Value::Map(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut record = Record::new();
        record.set("id", "ORD-1");
        record.set("total", 10.5);

        assert_eq!(record.get_text("id"), Some("ORD-1"));
        assert_eq!(record.get("total"), Some(&Value::Float(10.5)));
        assert_eq!(record.get("missing"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn merge_overwrites_colliding_fields() {
        let mut base = Record::new();
        base.set("id", "ORD-1");
        base.set("status", "pending");

        let mut incoming = Record::new();
        incoming.set("status", "cancelled");
        incoming.set("list_id", "800000-1");

        base.merge(incoming);

        assert_eq!(base.get_text("status"), Some("cancelled"));
        assert_eq!(base.get_text("list_id"), Some("800000-1"));
        assert_eq!(base.get_text("id"), Some("ORD-1"));
    }

    #[test]
    fn remove_field() {
        let mut record = Record::new();
        record.set("id", "X");
        assert_eq!(record.remove("id"), Some(Value::from("X")));
        assert!(record.is_empty());
    }
}
