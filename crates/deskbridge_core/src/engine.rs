//! The staging state machine.

use crate::error::{CoreError, CoreResult};
use crate::namespace::{Flow, Namespace};
use crate::notification::{success_message, NotificationStatus, NotificationSummary, MESSAGE_FIELD};
use crate::object_type::ObjectType;
use crate::paths::{filename, parse_notification_filename, parse_record_filename, KeyLayout};
use crate::report::{
    DestinationIdUpdate, DispatchCandidate, FinalizeReport, ObjectRef, Outcomes, Rejection,
    SaveReport, UpdateReport,
};
use crate::session::SessionStore;
use crate::stage::Stage;
use crate::two_phase::{expand_dependents, inventory_companion};
use deskbridge_codec::{decode_first_record, decode_records, encode_record, encode_records, Record, Value};
use deskbridge_storage::ObjectStore;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Orchestrates the record lifecycle across stages.
///
/// The engine is the sole writer of stage transitions. It holds no state of
/// its own - every operation runs synchronously against the object store,
/// so any number of engines may serve the same namespace and coordinate
/// purely through the store's collision-safe writes and atomic renames.
///
/// Batch operations treat records independently: one rejected or missing
/// record never aborts its siblings (the destination answers per record,
/// out of order, often much later).
pub struct StagingEngine {
    store: Arc<dyn ObjectStore>,
    namespace: Namespace,
    layout: KeyLayout,
}

impl StagingEngine {
    /// Creates an engine over a store, scoped to a namespace.
    pub fn new(store: Arc<dyn ObjectStore>, namespace: Namespace) -> Self {
        let layout = KeyLayout::new(&namespace);
        Self {
            store,
            namespace,
            layout,
        }
    }

    /// The namespace this engine serves.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The key layout this engine writes.
    #[must_use]
    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// A session store sharing this engine's store and namespace.
    #[must_use]
    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.store.clone(), &self.namespace)
    }

    /// Every key currently in a stage. Chiefly for inspection tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the store listing fails.
    pub fn list_stage(&self, stage: Stage) -> CoreResult<Vec<String>> {
        Ok(self
            .store
            .list_prefix(&self.layout.stage_contents_prefix(stage))?)
    }

    /// Validates and stages a batch of records of one type.
    ///
    /// Composite types (orders, shipments) are expanded first: their
    /// dependents go straight into pending, the composite itself parks in
    /// the two-phase stage until [`StagingEngine::promote_two_phase`] runs.
    /// Inventory records drag a companion product update into pending.
    ///
    /// Validation failures surface as failed notifications (same channel as
    /// destination-reported failures) and in the returned report; they
    /// never occupy a pending slot.
    ///
    /// # Errors
    ///
    /// Individual record failures land in the report, not here; only a
    /// failure to reach the store at all is returned as an error.
    pub fn save(&self, object_type: ObjectType, records: &[Record]) -> CoreResult<SaveReport> {
        let mut report = SaveReport::default();
        for record in records {
            if let Err(err) = self.save_one(object_type, record, &mut report) {
                warn!(%object_type, %err, "record skipped: staging write failed");
                report.rejected.push(Rejection {
                    object_type,
                    natural_key: object_type.natural_key(record),
                    reason: err.to_string(),
                });
            }
        }
        Ok(report)
    }

    fn save_one(
        &self,
        object_type: ObjectType,
        record: &Record,
        report: &mut SaveReport,
    ) -> CoreResult<()> {
        let Some(natural_key) = object_type.natural_key(record) else {
            warn!(%object_type, "record skipped: no natural key");
            report.rejected.push(Rejection {
                object_type,
                natural_key: None,
                reason: "record has no natural key".to_string(),
            });
            return Ok(());
        };

        if let Some(limit) = object_type.natural_key_limit() {
            if natural_key.len() > limit {
                let reason = CoreError::KeyTooLong {
                    object_type,
                    natural_key: natural_key.clone(),
                    limit,
                }
                .to_string();
                self.reject_with_notification(object_type, record, &reason)?;
                report.rejected.push(Rejection {
                    object_type,
                    natural_key: Some(natural_key),
                    reason,
                });
                return Ok(());
            }
        }

        let mut record = record.clone();
        self.apply_flow(object_type, &mut record);

        if object_type.is_two_phase() {
            for (dep_type, dep_record) in expand_dependents(object_type, &record) {
                let Some(dep_key) = dep_type.natural_key(&dep_record) else {
                    warn!(%object_type, %dep_type, "dependent skipped: no natural key");
                    continue;
                };
                let key = self.layout.record_key(Stage::Pending, dep_type, &dep_key);
                let actual = self.store.write(&key, &encode_record(&dep_record)?)?;
                debug!(key = %actual, "dependent staged");
                report.staged.push(actual);
            }

            let key = self
                .layout
                .record_key(Stage::TwoPhasePending, object_type, &natural_key);
            let actual = self.store.write(&key, &encode_record(&record)?)?;
            debug!(key = %actual, "composite staged for two-phase promotion");
            report.staged.push(actual);
        } else {
            if object_type == ObjectType::Inventory {
                let companion = inventory_companion(&natural_key);
                let key = self
                    .layout
                    .record_key(Stage::Pending, ObjectType::Product, &natural_key);
                let actual = self.store.write(&key, &encode_record(&companion)?)?;
                debug!(key = %actual, "inventory companion product staged");
                report.staged.push(actual);
            }

            let key = self.layout.record_key(Stage::Pending, object_type, &natural_key);
            let actual = self.store.write(&key, &encode_record(&record)?)?;
            debug!(key = %actual, "record staged");
            report.staged.push(actual);
        }

        Ok(())
    }

    /// Forces flow-level field values onto the payload.
    fn apply_flow(&self, object_type: ObjectType, record: &mut Record) {
        if self.namespace.flow == Some(Flow::CancelOrder) && object_type == ObjectType::Order {
            record.set("status", "cancelled");
        }
    }

    /// Stages one timestamped batch blob holding the whole slice.
    ///
    /// Used by the inbound polling direction, where the destination's
    /// answers arrive as one collection and are consumed via
    /// [`StagingEngine::drain_pending_to_processed`].
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the store write fails.
    pub fn save_polling_batch(
        &self,
        object_type: ObjectType,
        records: &[Record],
    ) -> CoreResult<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let key = self.layout.batch_key(Stage::Pending, object_type, timestamp);
        Ok(self.store.write(&key, &encode_records(records)?)?)
    }

    /// Relocates every two-phase record into pending.
    ///
    /// Idempotent: records already promoted (or consumed by a concurrent
    /// sweep) are skipped. Returns how many records were promoted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store listing or a non-absence rename
    /// failure occurs.
    pub fn promote_two_phase(&self) -> CoreResult<usize> {
        let prefix = self.layout.stage_contents_prefix(Stage::TwoPhasePending);
        let mut promoted = 0;

        for key in self.store.list_prefix(&prefix)? {
            let dest = self.layout.relocated(&key, Stage::Pending);
            match self.store.rename(&key, &dest) {
                Ok(outcome) => {
                    debug!(from = %key, to = %outcome.key(), "two-phase record promoted");
                    promoted += 1;
                }
                Err(err) if err.is_not_found() => {
                    warn!(%key, "two-phase record vanished before promotion");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(promoted)
    }

    /// Pulls every pending record for the external request builder.
    ///
    /// Each blob is relocated into ready *before* this returns: a crash
    /// after relocation leaves the record parked in ready rather than
    /// eligible for a second pickup from pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the store listing fails; individual unreadable
    /// or undecodable blobs are logged and skipped.
    pub fn list_pending_for_dispatch(&self) -> CoreResult<Vec<DispatchCandidate>> {
        let prefix = self.layout.stage_contents_prefix(Stage::Pending);
        let mut candidates = Vec::new();

        for key in self.store.list_prefix(&prefix)? {
            let Some(parsed) = parse_record_filename(filename(&key)) else {
                warn!(%key, "pending blob with malformed name left in place");
                continue;
            };

            let bytes = match self.store.read(&key) {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() => {
                    warn!(%key, "pending record vanished before dispatch");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let dest = self.layout.relocated(&key, Stage::Ready);
            match self.store.rename(&key, &dest) {
                Ok(outcome) => debug!(from = %key, to = %outcome.key(), "record moved to ready"),
                Err(err) if err.is_not_found() => {
                    warn!(%key, "pending record vanished before relocation");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            match decode_records(&bytes) {
                Ok(records) => candidates.extend(records.into_iter().map(|record| {
                    DispatchCandidate {
                        object_type: parsed.object_type,
                        record,
                    }
                })),
                Err(err) => warn!(%key, %err, "undecodable blob parked in ready"),
            }
        }

        Ok(candidates)
    }

    /// The ready-stage records eligible for this dispatch round.
    ///
    /// Notification blobs are excluded, destination ids already earned are
    /// merged into the payload, and the precedence filter keeps only the
    /// highest non-empty tier (see [`select_with_precedence`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the store listing fails.
    pub fn ready_for_dispatch(&self) -> CoreResult<Vec<DispatchCandidate>> {
        let prefix = self.layout.stage_contents_prefix(Stage::Ready);
        let mut candidates = Vec::new();

        for key in self.store.list_prefix(&prefix)? {
            let name = filename(&key);
            if name.starts_with("notification_") {
                continue;
            }
            let Some(parsed) = parse_record_filename(name) else {
                warn!(%key, "ready blob with malformed name excluded from dispatch");
                continue;
            };

            let bytes = match self.store.read(&key) {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() => {
                    warn!(%key, "ready record vanished mid-listing");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let mut record = match decode_first_record(&bytes) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%key, %err, "undecodable ready record excluded from dispatch");
                    continue;
                }
            };

            if let Some(list_id) = parsed.list_id {
                record.set("list_id", list_id);
            }
            if let Some(edit_sequence) = parsed.edit_sequence {
                record.set("edit_sequence", edit_sequence);
            }

            candidates.push(DispatchCandidate {
                object_type: parsed.object_type,
                record,
            });
        }

        Ok(select_with_precedence(candidates))
    }

    /// The inbound query path: drains pending blobs of one type straight to
    /// processed, returning their decoded contents.
    ///
    /// Inbound records have no ready/dispatch cycle - the destination
    /// already answered - so they skip it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store listing fails.
    pub fn drain_pending_to_processed(
        &self,
        object_type: ObjectType,
    ) -> CoreResult<Vec<DispatchCandidate>> {
        let prefix = self.layout.type_prefix(Stage::Pending, object_type);
        let mut drained = Vec::new();

        for key in self.store.list_prefix(&prefix)? {
            let bytes = match self.store.read(&key) {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() => {
                    warn!(%key, "pending record vanished mid-drain");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let dest = self.layout.relocated(&key, Stage::Processed);
            match self.store.rename(&key, &dest) {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    warn!(%key, "pending record vanished before drain relocation");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            match decode_records(&bytes) {
                Ok(records) => drained.extend(records.into_iter().map(|record| {
                    DispatchCandidate {
                        object_type,
                        record,
                    }
                })),
                Err(err) => warn!(%key, %err, "undecodable blob drained to processed"),
            }
        }

        Ok(drained)
    }

    /// Attaches destination-issued identities to ready records.
    ///
    /// Each update relocates its record to a key carrying the ids and, when
    /// extra payload data is supplied, folds it into the decoded record.
    /// References with no matching ready record (already retried, already
    /// finalized) are reported and skipped.
    ///
    /// # Errors
    ///
    /// Individual failures land in the report; only a store listing failure
    /// is returned as an error.
    pub fn update_with_destination_ids(
        &self,
        updates: &[DestinationIdUpdate],
    ) -> CoreResult<UpdateReport> {
        let mut report = UpdateReport::default();

        for update in updates {
            match self.apply_update(update) {
                Ok(Some(key)) => report.updated.push(key),
                Ok(None) => {
                    warn!(
                        object_type = %update.object_type,
                        natural_key = %update.natural_key,
                        "no ready record to update with destination ids"
                    );
                    report
                        .missing
                        .push(ObjectRef::new(update.object_type, &update.natural_key));
                }
                Err(err) => {
                    warn!(
                        object_type = %update.object_type,
                        natural_key = %update.natural_key,
                        %err,
                        "destination id update failed"
                    );
                    report
                        .missing
                        .push(ObjectRef::new(update.object_type, &update.natural_key));
                }
            }
        }

        Ok(report)
    }

    fn apply_update(&self, update: &DestinationIdUpdate) -> CoreResult<Option<String>> {
        let prefix =
            self.layout
                .record_prefix(Stage::Ready, update.object_type, &update.natural_key);

        // Only records still waiting for ids; a record already updated
        // carries a list id token and is not a candidate.
        let key = self.store.list_prefix(&prefix)?.into_iter().find(|key| {
            parse_record_filename(filename(key)).is_some_and(|parsed| parsed.list_id.is_none())
        });
        let Some(key) = key else {
            return Ok(None);
        };

        let dest = self.layout.record_key_with_ids(
            Stage::Ready,
            update.object_type,
            &update.natural_key,
            &update.list_id,
            &update.edit_sequence,
        );

        if let Some(extra) = &update.extra {
            let bytes = match self.store.read(&key) {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            let mut record = decode_first_record(&bytes)?;
            record.merge(extra.clone());

            // Write before delete: a failure in between leaves a duplicate
            // to reconcile, never a lost record.
            let actual = self.store.write(&dest, &encode_record(&record)?)?;
            self.store.delete(&key)?;
            debug!(from = %key, to = %actual, "destination ids and extra data attached");
            Ok(Some(actual))
        } else {
            match self.store.rename(&key, &dest) {
                Ok(outcome) => {
                    debug!(from = %key, to = %outcome.key(), "destination ids attached");
                    Ok(Some(outcome.into_key()))
                }
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err.into()),
            }
        }
    }

    /// Moves ready records to their terminal stage.
    ///
    /// Processed records additionally leave a success notification copy in
    /// the ready stage for [`StagingEngine::collect_notifications`] to
    /// drain. Failed records leave none here - their failed notification is
    /// written by the path that learned of the failure
    /// ([`StagingEngine::reject_with_notification`] or
    /// [`StagingEngine::fail_from_session`]).
    ///
    /// # Errors
    ///
    /// Individual missing records land in the report; only a store listing
    /// failure is returned as an error.
    pub fn finalize(&self, outcomes: &Outcomes) -> CoreResult<FinalizeReport> {
        let mut report = FinalizeReport::default();

        for (status, refs) in [
            (NotificationStatus::Processed, &outcomes.processed),
            (NotificationStatus::Failed, &outcomes.failed),
        ] {
            for object_ref in refs {
                self.finalize_one(status, object_ref, &mut report)?;
            }
        }

        Ok(report)
    }

    fn finalize_one(
        &self,
        status: NotificationStatus,
        object_ref: &ObjectRef,
        report: &mut FinalizeReport,
    ) -> CoreResult<()> {
        let terminal_stage = match status {
            NotificationStatus::Processed => Stage::Processed,
            NotificationStatus::Failed => Stage::Failed,
        };

        // The prefix search absorbs store collision suffixes on the
        // trailing token.
        let prefix = self.layout.record_prefix(
            Stage::Ready,
            object_ref.object_type,
            &object_ref.natural_key,
        );
        let keys = self.store.list_prefix(&prefix)?;

        if keys.is_empty() {
            warn!(
                object_type = %object_ref.object_type,
                natural_key = %object_ref.natural_key,
                %status,
                "no ready record to finalize"
            );
            report.missing.push(object_ref.clone());
            return Ok(());
        }

        for key in keys {
            let dest = if object_ref.has_destination_id() {
                self.layout.record_key_with_ids(
                    terminal_stage,
                    object_ref.object_type,
                    &object_ref.natural_key,
                    object_ref.list_id.as_deref().unwrap_or_default(),
                    object_ref.edit_sequence.as_deref().unwrap_or_default(),
                )
            } else {
                self.layout
                    .record_key(terminal_stage, object_ref.object_type, &object_ref.natural_key)
            };

            let terminal_key = match self.store.rename(&key, &dest) {
                Ok(outcome) => outcome.into_key(),
                Err(err) if err.is_not_found() => {
                    warn!(%key, "ready record vanished before finalize");
                    report.missing.push(object_ref.clone());
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if status == NotificationStatus::Processed {
                let notify_key = self
                    .layout
                    .notification_key_for(status, filename(&terminal_key));
                match self.store.copy(&terminal_key, &notify_key) {
                    Ok(actual) => report.notifications.push(actual),
                    Err(err) => {
                        warn!(key = %terminal_key, %err, "success notification copy failed");
                    }
                }
            }

            debug!(key = %terminal_key, %status, "record finalized");
            report.relocated.push(terminal_key);
        }

        Ok(())
    }

    /// Drains ready-stage notifications matching the type filter.
    ///
    /// Payments are a derived consequence of orders, so an order filter
    /// also drains payment notifications. Each drained notification is
    /// relocated to processed - this is a destructive read, and a second
    /// call never returns the same object reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the store listing fails.
    pub fn collect_notifications(
        &self,
        object_type: ObjectType,
    ) -> CoreResult<NotificationSummary> {
        let mut summary = NotificationSummary::new();

        for key in self.store.list_prefix(&self.layout.notification_prefix())? {
            let Some(parsed) = parse_notification_filename(filename(&key)) else {
                warn!(%key, "notification with malformed name left in place");
                continue;
            };
            if !notification_matches(object_type, parsed.object_type) {
                continue;
            }

            let message = match self.store.read(&key) {
                Ok(bytes) => match decode_first_record(&bytes) {
                    Ok(record) => record
                        .get_text(MESSAGE_FIELD)
                        .map(str::to_string)
                        .unwrap_or_else(|| success_message(parsed.object_type)),
                    Err(err) => {
                        warn!(%key, %err, "undecodable notification payload");
                        success_message(parsed.object_type)
                    }
                },
                Err(err) if err.is_not_found() => {
                    warn!(%key, "notification vanished mid-drain");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let dest = self.layout.relocated(&key, Stage::Processed);
            match self.store.rename(&key, &dest) {
                Ok(_) => summary.add(parsed.status, message, parsed.object_ref),
                Err(err) if err.is_not_found() => {
                    warn!(%key, "notification consumed by a concurrent drain");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(summary)
    }

    /// Writes a failed notification directly, bypassing pending.
    ///
    /// Validation failures surface through the same reconciliation channel
    /// as destination-reported failures without ever occupying a pending
    /// slot. Returns the notification key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingNaturalKey`] when the record has no
    /// identity to report against, or an error if the write fails.
    pub fn reject_with_notification(
        &self,
        object_type: ObjectType,
        record: &Record,
        reason: &str,
    ) -> CoreResult<String> {
        let natural_key = object_type
            .natural_key(record)
            .ok_or(CoreError::MissingNaturalKey { object_type })?;

        let mut payload = record.clone();
        payload.set(MESSAGE_FIELD, reason);

        let key = self
            .layout
            .notification_key(NotificationStatus::Failed, object_type, &natural_key);
        let actual = self.store.write(&key, &encode_record(&payload)?)?;
        warn!(%object_type, %natural_key, reason, "record rejected with notification");
        Ok(actual)
    }

    /// Reconciles a destination-reported failure that only carries a
    /// session id.
    ///
    /// Loads the session snapshot to recover the record context, writes a
    /// failed notification holding the error context and the snapshot, and
    /// finalizes the originating ready record as failed.
    ///
    /// `error_context` should carry a `message` field; one is synthesized
    /// when absent so the failure never masquerades as a success.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionNotFound`] for an unknown session id.
    pub fn fail_from_session(
        &self,
        object_type: ObjectType,
        session_id: &str,
        error_context: &Record,
    ) -> CoreResult<FinalizeReport> {
        let snapshot = self
            .sessions()
            .load(session_id)?
            .ok_or_else(|| CoreError::session_not_found(session_id))?;

        let natural_key = object_type
            .natural_key(&snapshot)
            .or_else(|| snapshot.get_text("id").map(str::to_string))
            .ok_or(CoreError::MissingNaturalKey { object_type })?;

        let mut payload = error_context.clone();
        if payload.get_text(MESSAGE_FIELD).is_none() {
            payload.set(MESSAGE_FIELD, "record rejected by the accounting system");
        }
        payload.set("object", Value::from(snapshot));

        let key = self
            .layout
            .notification_key(NotificationStatus::Failed, object_type, &natural_key);
        self.store.write(&key, &encode_record(&payload)?)?;
        warn!(%object_type, %natural_key, session_id, "destination failure reconciled from session");

        self.finalize(&Outcomes::failed(vec![ObjectRef::new(
            object_type,
            natural_key,
        )]))
    }
}

impl std::fmt::Debug for StagingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingEngine")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Keeps only the highest-precedence non-empty tier of candidates.
///
/// Tier 1 types (the ones composites reference) dispatch before tier 2
/// composites; whatever remains goes once both are drained. Each dispatch
/// round re-evaluates the ready set, so no tier starves: tier 2 is served
/// as soon as tier 1 drains.
#[must_use]
pub fn select_with_precedence(candidates: Vec<DispatchCandidate>) -> Vec<DispatchCandidate> {
    for tier in [1u8, 2] {
        if candidates
            .iter()
            .any(|candidate| candidate.object_type.precedence_tier() == tier)
        {
            return candidates
                .into_iter()
                .filter(|candidate| candidate.object_type.precedence_tier() == tier)
                .collect();
        }
    }
    candidates
}

fn notification_matches(filter: ObjectType, actual: ObjectType) -> bool {
    actual == filter || (filter == ObjectType::Order && actual == ObjectType::Payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskbridge_storage::InMemoryStore;
    use std::collections::BTreeMap;

    fn engine() -> (Arc<InMemoryStore>, StagingEngine) {
        engine_with(Namespace::new("conn-1"))
    }

    fn engine_with(namespace: Namespace) -> (Arc<InMemoryStore>, StagingEngine) {
        let store = Arc::new(InMemoryStore::new());
        let engine = StagingEngine::new(store.clone(), namespace);
        (store, engine)
    }

    fn record(fields: &[(&str, &str)]) -> Record {
        let mut record = Record::new();
        for (field, value) in fields {
            record.set(*field, *value);
        }
        record
    }

    fn address(first: &str, last: &str) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("firstname".to_string(), Value::from(first));
        fields.insert("lastname".to_string(), Value::from(last));
        Value::Map(fields)
    }

    fn order(id: &str) -> Record {
        let mut line = BTreeMap::new();
        line.insert("product_id".to_string(), Value::from("T-SHIRT-1"));
        line.insert("price".to_string(), Value::from(19.99));

        let mut record = record(&[("id", id), ("email", "alice@example.com")]);
        record.set("billing_address", address("Alice", "Silva"));
        record.set("line_items", Value::Array(vec![Value::Map(line)]));
        record
    }

    #[test]
    fn save_then_dispatch_drains_pending() {
        let (store, engine) = engine();
        let product = record(&[("id", "SKU-1"), ("name", "Shirt")]);

        let report = engine.save(ObjectType::Product, &[product.clone()]).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.staged, vec!["conn-1/primary_pending/products_SKU-1_.cbor"]);

        let candidates = engine.list_pending_for_dispatch().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].object_type, ObjectType::Product);
        assert_eq!(candidates[0].record, product);

        assert!(engine.list_stage(Stage::Pending).unwrap().is_empty());
        assert_eq!(
            engine.list_stage(Stage::Ready).unwrap(),
            vec!["conn-1/primary_ready/products_SKU-1_.cbor"]
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn overlong_order_key_is_rejected_with_notification() {
        let (_, engine) = engine();
        let report = engine
            .save(ObjectType::Order, &[order("R15408534687")])
            .unwrap();

        assert_eq!(report.staged, Vec::<String>::new());
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].reason.contains("11 character"));

        assert!(engine.list_stage(Stage::Pending).unwrap().is_empty());
        assert!(engine.list_stage(Stage::TwoPhasePending).unwrap().is_empty());
        assert_eq!(
            engine.list_stage(Stage::Ready).unwrap(),
            vec!["conn-1/primary_ready/notification_failed_orders_R15408534687_.cbor"]
        );
    }

    #[test]
    fn eleven_character_key_is_accepted() {
        let (_, engine) = engine();
        let report = engine.save(ObjectType::Order, &[order("R1540853468")]).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn record_without_natural_key_is_skipped() {
        let (store, engine) = engine();
        let report = engine
            .save(ObjectType::Product, &[record(&[("name", "no id")])])
            .unwrap();

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].natural_key, None);
        assert!(store.is_empty());
    }

    #[test]
    fn two_phase_order_parks_composite_until_promotion() {
        let (_, engine) = engine();
        engine.save(ObjectType::Order, &[order("ORD-1")]).unwrap();

        let pending = engine.list_stage(Stage::Pending).unwrap();
        assert_eq!(
            pending,
            vec![
                "conn-1/primary_pending/customers_Alice Silva_.cbor",
                "conn-1/primary_pending/products_T-SHIRT-1_.cbor",
            ]
        );
        assert_eq!(
            engine.list_stage(Stage::TwoPhasePending).unwrap(),
            vec!["conn-1/primary_two_phase_pending/orders_ORD-1_.cbor"]
        );

        assert_eq!(engine.promote_two_phase().unwrap(), 1);
        assert_eq!(engine.list_stage(Stage::Pending).unwrap().len(), 3);
        assert!(engine.list_stage(Stage::TwoPhasePending).unwrap().is_empty());

        // Nothing left to promote; the sweep is idempotent.
        assert_eq!(engine.promote_two_phase().unwrap(), 0);
    }

    #[test]
    fn inventory_drags_companion_product() {
        let (_, engine) = engine();
        engine
            .save(
                ObjectType::Inventory,
                &[record(&[("product_id", "SKU-9"), ("quantity", "4")])],
            )
            .unwrap();

        assert_eq!(
            engine.list_stage(Stage::Pending).unwrap(),
            vec![
                "conn-1/primary_pending/inventories_SKU-9_.cbor",
                "conn-1/primary_pending/products_SKU-9_.cbor",
            ]
        );
    }

    #[test]
    fn cancel_flow_forces_order_status() {
        let (store, engine) = engine_with(Namespace::new("conn-1").flow(Flow::CancelOrder));
        engine.save(ObjectType::Order, &[order("ORD-1")]).unwrap();

        let bytes = store
            .read("conn-1/primary_two_phase_pending/orders_ORD-1_.cbor")
            .unwrap();
        let staged = decode_first_record(&bytes).unwrap();
        assert_eq!(staged.get_text("status"), Some("cancelled"));
    }

    #[test]
    fn ready_dispatch_honors_precedence() {
        let (_, engine) = engine();
        engine.save(ObjectType::Customer, &[record(&[("email", "a@x.com")])]).unwrap();
        engine.save(ObjectType::Return, &[record(&[("id", "RET-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();

        // Tier 1 first.
        let round_one = engine.ready_for_dispatch().unwrap();
        assert_eq!(round_one.len(), 1);
        assert_eq!(round_one[0].object_type, ObjectType::Customer);

        // Once tier 1 drains, tier 2 is served.
        engine
            .finalize(&Outcomes::processed(vec![ObjectRef::new(
                ObjectType::Customer,
                "a@x.com",
            )]))
            .unwrap();
        let round_two = engine.ready_for_dispatch().unwrap();
        assert_eq!(round_two.len(), 1);
        assert_eq!(round_two[0].object_type, ObjectType::Return);
    }

    #[test]
    fn precedence_filter_is_pure() {
        let customer = DispatchCandidate {
            object_type: ObjectType::Customer,
            record: record(&[("email", "a@x.com")]),
        };
        let order = DispatchCandidate {
            object_type: ObjectType::Order,
            record: record(&[("id", "ORD-1")]),
        };
        let shipment = DispatchCandidate {
            object_type: ObjectType::Shipment,
            record: record(&[("order_id", "ORD-1")]),
        };

        let selected = select_with_precedence(vec![customer.clone(), order.clone(), shipment.clone()]);
        assert_eq!(selected, vec![customer]);

        let selected = select_with_precedence(vec![order.clone(), shipment.clone()]);
        assert_eq!(selected, vec![order]);

        let selected = select_with_precedence(vec![shipment.clone()]);
        assert_eq!(selected, vec![shipment]);

        assert!(select_with_precedence(Vec::new()).is_empty());
    }

    #[test]
    fn ready_dispatch_merges_ids_and_skips_notifications() {
        let (_, engine) = engine();
        engine.save(ObjectType::Product, &[record(&[("id", "SKU-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();
        engine
            .update_with_destination_ids(&[DestinationIdUpdate::new(
                ObjectType::Product,
                "SKU-1",
                "800000-7",
                "3",
            )])
            .unwrap();
        engine
            .reject_with_notification(
                ObjectType::Product,
                &record(&[("id", "SKU-2")]),
                "boom",
            )
            .unwrap();

        let candidates = engine.ready_for_dispatch().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].record.get_text("list_id"), Some("800000-7"));
        assert_eq!(candidates[0].record.get_text("edit_sequence"), Some("3"));
    }

    #[test]
    fn update_renames_and_reports_missing() {
        let (_, engine) = engine();
        engine.save(ObjectType::Product, &[record(&[("id", "SKU-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();

        let report = engine
            .update_with_destination_ids(&[
                DestinationIdUpdate::new(ObjectType::Product, "SKU-1", "800000-7", "3"),
                DestinationIdUpdate::new(ObjectType::Product, "SKU-404", "800000-8", "1"),
            ])
            .unwrap();

        assert_eq!(
            report.updated,
            vec!["conn-1/primary_ready/products_SKU-1_800000-7_3.cbor"]
        );
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].natural_key, "SKU-404");
    }

    #[test]
    fn update_merges_extra_data() {
        let (store, engine) = engine();
        engine.save(ObjectType::Product, &[record(&[("id", "SKU-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();

        let report = engine
            .update_with_destination_ids(&[DestinationIdUpdate::new(
                ObjectType::Product,
                "SKU-1",
                "800000-7",
                "3",
            )
            .with_extra(record(&[("description", "from destination")]))])
            .unwrap();

        let bytes = store.read(&report.updated[0]).unwrap();
        let updated = decode_first_record(&bytes).unwrap();
        assert_eq!(updated.get_text("description"), Some("from destination"));
        assert_eq!(updated.get_text("id"), Some("SKU-1"));
    }

    #[test]
    fn update_skips_records_already_carrying_ids() {
        let (_, engine) = engine();
        engine.save(ObjectType::Product, &[record(&[("id", "SKU-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();

        let update = DestinationIdUpdate::new(ObjectType::Product, "SKU-1", "800000-7", "3");
        engine.update_with_destination_ids(&[update.clone()]).unwrap();

        let second = engine.update_with_destination_ids(&[update]).unwrap();
        assert!(second.updated.is_empty());
        assert_eq!(second.missing.len(), 1);
    }

    #[test]
    fn finalize_processed_creates_exactly_one_notification() {
        let (_, engine) = engine();
        engine.save(ObjectType::Return, &[record(&[("id", "RET-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();

        let report = engine
            .finalize(&Outcomes::processed(vec![ObjectRef::new(
                ObjectType::Return,
                "RET-1",
            )]))
            .unwrap();

        assert_eq!(report.relocated, vec!["conn-1/primary_processed/returns_RET-1_.cbor"]);
        assert_eq!(
            report.notifications,
            vec!["conn-1/primary_ready/notification_processed_returns_RET-1_.cbor"]
        );
        assert!(report.missing.is_empty());
    }

    #[test]
    fn finalize_failed_creates_no_notification() {
        let (_, engine) = engine();
        engine.save(ObjectType::Return, &[record(&[("id", "RET-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();

        let report = engine
            .finalize(&Outcomes::failed(vec![ObjectRef::new(
                ObjectType::Return,
                "RET-1",
            )]))
            .unwrap();

        assert_eq!(report.relocated, vec!["conn-1/primary_failed/returns_RET-1_.cbor"]);
        assert!(report.notifications.is_empty());
        assert!(engine.list_stage(Stage::Ready).unwrap().is_empty());
    }

    #[test]
    fn finalize_appends_destination_ids_to_terminal_key() {
        let (_, engine) = engine();
        engine.save(ObjectType::Product, &[record(&[("id", "SKU-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();
        engine
            .update_with_destination_ids(&[DestinationIdUpdate::new(
                ObjectType::Product,
                "SKU-1",
                "800000-7",
                "3",
            )])
            .unwrap();

        let report = engine
            .finalize(&Outcomes::processed(vec![ObjectRef::new(
                ObjectType::Product,
                "SKU-1",
            )
            .with_ids("800000-7", "3")]))
            .unwrap();

        assert_eq!(
            report.relocated,
            vec!["conn-1/primary_processed/products_SKU-1_800000-7_3.cbor"]
        );
    }

    #[test]
    fn finalize_missing_record_continues_batch() {
        let (_, engine) = engine();
        engine.save(ObjectType::Product, &[record(&[("id", "SKU-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();

        let report = engine
            .finalize(&Outcomes::processed(vec![
                ObjectRef::new(ObjectType::Product, "SKU-404"),
                ObjectRef::new(ObjectType::Product, "SKU-1"),
            ]))
            .unwrap();

        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].natural_key, "SKU-404");
        assert_eq!(report.relocated.len(), 1);
    }

    #[test]
    fn notifications_drain_exactly_once() {
        let (_, engine) = engine();
        engine.save(ObjectType::Product, &[record(&[("id", "SKU-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();
        engine
            .finalize(&Outcomes::processed(vec![ObjectRef::new(
                ObjectType::Product,
                "SKU-1",
            )]))
            .unwrap();

        let first = engine.collect_notifications(ObjectType::Product).unwrap();
        let message = success_message(ObjectType::Product);
        assert_eq!(first.processed[&message], vec!["SKU-1"]);

        let second = engine.collect_notifications(ObjectType::Product).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn order_filter_also_drains_payment_notifications() {
        let (_, engine) = engine();
        engine
            .reject_with_notification(
                ObjectType::Payment,
                &record(&[("id", "PAY-1")]),
                "no matching invoice",
            )
            .unwrap();
        engine
            .reject_with_notification(
                ObjectType::Customer,
                &record(&[("email", "a@x.com")]),
                "unrelated",
            )
            .unwrap();

        let summary = engine.collect_notifications(ObjectType::Order).unwrap();
        assert_eq!(summary.failed["no matching invoice"], vec!["PAY-1"]);
        assert_eq!(summary.len(), 1);

        // The customer notification is still there for its own filter.
        let customers = engine.collect_notifications(ObjectType::Customer).unwrap();
        assert_eq!(customers.failed["unrelated"], vec!["a@x.com"]);
    }

    #[test]
    fn reject_without_natural_key_is_an_error() {
        let (_, engine) = engine();
        let err = engine
            .reject_with_notification(ObjectType::Product, &Record::new(), "whatever")
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingNaturalKey { .. }));
    }

    #[test]
    fn fail_from_session_reconciles_ready_record() {
        let (_, engine) = engine();
        engine.save(ObjectType::Product, &[record(&[("id", "SKU-1")])]).unwrap();
        engine.list_pending_for_dispatch().unwrap();

        let session_id = engine
            .sessions()
            .save(&record(&[("id", "SKU-1")]), None)
            .unwrap();

        let report = engine
            .fail_from_session(
                ObjectType::Product,
                &session_id,
                &record(&[("message", "destination said no")]),
            )
            .unwrap();

        assert_eq!(report.relocated, vec!["conn-1/primary_failed/products_SKU-1_.cbor"]);

        let summary = engine.collect_notifications(ObjectType::Product).unwrap();
        assert_eq!(summary.failed["destination said no"], vec!["SKU-1"]);
    }

    #[test]
    fn fail_from_unknown_session_is_an_error() {
        let (_, engine) = engine();
        let err = engine
            .fail_from_session(ObjectType::Product, "no-such-id", &Record::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionNotFound { .. }));
    }

    #[test]
    fn polling_batch_drains_to_processed() {
        let (_, engine) = engine();
        let records = vec![
            record(&[("id", "SKU-1"), ("quantity", "3")]),
            record(&[("id", "SKU-2"), ("quantity", "5")]),
        ];
        let key = engine
            .save_polling_batch(ObjectType::Inventory, &records)
            .unwrap();
        assert!(key.starts_with("conn-1/primary_pending/inventories_"));

        let drained = engine.drain_pending_to_processed(ObjectType::Inventory).unwrap();
        assert_eq!(drained.len(), 2);
        assert!(engine.list_stage(Stage::Pending).unwrap().is_empty());
        assert_eq!(engine.list_stage(Stage::Processed).unwrap().len(), 1);

        // Nothing pending; a second drain is empty.
        assert!(engine
            .drain_pending_to_processed(ObjectType::Inventory)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn namespaces_do_not_observe_each_other() {
        let store = Arc::new(InMemoryStore::new());
        let outbound = StagingEngine::new(store.clone(), Namespace::new("conn-1"));
        let inbound = StagingEngine::new(
            store.clone(),
            Namespace::new("conn-1").origin("destination"),
        );

        outbound
            .save(ObjectType::Product, &[record(&[("id", "SKU-1")])])
            .unwrap();

        assert!(inbound.list_pending_for_dispatch().unwrap().is_empty());
        assert_eq!(outbound.list_stage(Stage::Pending).unwrap().len(), 1);
    }
}
