//! End-to-end staging lifecycle against an in-memory store.

use deskbridge_codec::{Record, Value};
use deskbridge_core::{
    success_message, DestinationIdUpdate, Namespace, ObjectRef, ObjectType, Outcomes, Stage,
    StagingEngine,
};
use deskbridge_storage::InMemoryStore;
use std::collections::BTreeMap;
use std::sync::Arc;

fn order_with_line_item(id: &str) -> Record {
    let mut billing = BTreeMap::new();
    billing.insert("firstname".to_string(), Value::from("Alice"));
    billing.insert("lastname".to_string(), Value::from("Silva"));

    let mut line = BTreeMap::new();
    line.insert("product_id".to_string(), Value::from("T-SHIRT-1"));
    line.insert("quantity".to_string(), Value::from(2i64));
    line.insert("price".to_string(), Value::from(19.99));

    let mut order = Record::new();
    order.set("id", id);
    order.set("email", "alice@example.com");
    order.set("billing_address", Value::Map(billing));
    order.set("line_items", Value::Array(vec![Value::Map(line)]));
    order
}

#[test]
fn order_lifecycle_from_staging_to_notification() {
    let engine = StagingEngine::new(
        Arc::new(InMemoryStore::new()),
        Namespace::new("54372cb069702d1f59000000"),
    );

    // Stage: the order parks in two-phase, its dependents go to pending.
    let report = engine
        .save(ObjectType::Order, &[order_with_line_item("ORD-1")])
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.staged.len(), 3); // customer, product, order

    engine.promote_two_phase().unwrap();

    // Dispatch sweep: everything pending relocates to ready.
    let pulled = engine.list_pending_for_dispatch().unwrap();
    assert_eq!(pulled.len(), 3);
    assert!(engine.list_stage(Stage::Pending).unwrap().is_empty());

    // Precedence: the customer and product go out before the order.
    let round_one = engine.ready_for_dispatch().unwrap();
    assert!(round_one
        .iter()
        .all(|c| c.object_type.precedence_tier() == 1));
    for candidate in &round_one {
        let natural_key = candidate.object_type.natural_key(&candidate.record).unwrap();
        engine
            .finalize(&Outcomes::processed(vec![ObjectRef::new(
                candidate.object_type,
                natural_key,
            )]))
            .unwrap();
    }

    let round_two = engine.ready_for_dispatch().unwrap();
    assert_eq!(round_two.len(), 1);
    assert_eq!(round_two[0].object_type, ObjectType::Order);

    // The destination assigns its identifiers asynchronously.
    let update = engine
        .update_with_destination_ids(&[DestinationIdUpdate::new(
            ObjectType::Order,
            "ORD-1",
            "800000-1",
            "1",
        )])
        .unwrap();
    assert_eq!(
        update.updated,
        vec!["54372cb069702d1f59000000/primary_ready/orders_ORD-1_800000-1_1.cbor"]
    );

    // Acceptance finalizes the order and leaves one success notification.
    let finalize = engine
        .finalize(&Outcomes::processed(vec![ObjectRef::new(
            ObjectType::Order,
            "ORD-1",
        )
        .with_ids("800000-1", "1")]))
        .unwrap();
    assert_eq!(finalize.notifications.len(), 1);

    let summary = engine.collect_notifications(ObjectType::Order).unwrap();
    assert_eq!(
        summary.processed[&success_message(ObjectType::Order)],
        vec!["ORD-1"]
    );
    assert!(summary.failed.is_empty());

    // The drain is destructive.
    assert!(engine
        .collect_notifications(ObjectType::Order)
        .unwrap()
        .is_empty());
}

#[test]
fn session_correlation_survives_out_of_order_replies() {
    let store = Arc::new(InMemoryStore::new());
    let engine = StagingEngine::new(store, Namespace::new("conn-e2e"));
    let sessions = engine.sessions();

    let mut shipment = Record::new();
    shipment.set("order_id", "ORD-7");
    shipment.set("tracking", "BR123456789");

    // Two in-flight requests snapshot the same shipment under distinct tags.
    let as_shipment = sessions.save(&shipment, None).unwrap();
    let as_order = sessions.save(&shipment, Some("order")).unwrap();
    assert_ne!(as_shipment, as_order);

    // The later reply recovers the full context from its id alone.
    let recovered = sessions.load(&as_order).unwrap().unwrap();
    assert_eq!(recovered.get_text("tracking"), Some("BR123456789"));

    sessions.delete(&as_order).unwrap();
    assert!(sessions.load(&as_order).unwrap().is_none());
    assert!(sessions.load(&as_shipment).unwrap().is_some());
}

#[test]
fn validation_failures_share_the_notification_channel() {
    let engine = StagingEngine::new(Arc::new(InMemoryStore::new()), Namespace::new("conn-e2e"));

    // Overlong order reference: rejected at staging, surfaced on drain.
    let report = engine
        .save(ObjectType::Order, &[order_with_line_item("ORD-TOO-LONG-1")])
        .unwrap();
    assert_eq!(report.rejected.len(), 1);
    assert!(engine.list_stage(Stage::Pending).unwrap().is_empty());

    let summary = engine.collect_notifications(ObjectType::Order).unwrap();
    let (message, refs) = summary.failed.iter().next().unwrap();
    assert!(message.contains("11 character"));
    assert_eq!(refs, &vec!["ORD-TOO-LONG-1".to_string()]);
}
