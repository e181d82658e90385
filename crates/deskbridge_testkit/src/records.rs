//! Realistic sample records for every object type.

use deskbridge_codec::{Record, Value};
use std::collections::BTreeMap;

/// A billing or shipping address block.
#[must_use]
pub fn address(firstname: &str, lastname: &str) -> Value {
    let mut fields = BTreeMap::new();
    fields.insert("firstname".to_string(), Value::from(firstname));
    fields.insert("lastname".to_string(), Value::from(lastname));
    fields.insert("address1".to_string(), Value::from("123 Main St"));
    fields.insert("city".to_string(), Value::from("Springfield"));
    fields.insert("state".to_string(), Value::from("IL"));
    fields.insert("zipcode".to_string(), Value::from("62701"));
    fields.insert("country".to_string(), Value::from("US"));
    Value::Map(fields)
}

/// A line item selling `product_id`.
#[must_use]
pub fn line_item(product_id: &str, quantity: i64, price: f64) -> Value {
    let mut fields = BTreeMap::new();
    fields.insert("product_id".to_string(), Value::from(product_id));
    fields.insert("description".to_string(), Value::from("Sample item"));
    fields.insert("quantity".to_string(), Value::from(quantity));
    fields.insert("price".to_string(), Value::from(price));
    Value::Map(fields)
}

/// An order with one line item and full addresses.
#[must_use]
pub fn order(id: &str) -> Record {
    let mut record = Record::new();
    record.set("id", id);
    record.set("email", "alice@example.com");
    record.set("placed_on", "2015-05-12");
    record.set("billing_address", address("Alice", "Silva"));
    record.set("shipping_address", address("Alice", "Silva"));
    record.set("line_items", Value::Array(vec![line_item("T-SHIRT-1", 2, 19.99)]));
    record.set("totals", {
        let mut totals = BTreeMap::new();
        totals.insert("order".to_string(), Value::from(39.98));
        Value::Map(totals)
    });
    record
}

/// A customer keyed by email.
#[must_use]
pub fn customer(email: &str) -> Record {
    let mut record = Record::new();
    record.set("id", "Alice Silva");
    record.set("email", email);
    record.set("firstname", "Alice");
    record.set("lastname", "Silva");
    record.set("billing_address", address("Alice", "Silva"));
    record
}

/// A product keyed by its identifier.
#[must_use]
pub fn product(id: &str) -> Record {
    let mut record = Record::new();
    record.set("id", id);
    record.set("description", "Sample product");
    record.set("price", 19.99);
    record
}

/// A shipment fulfilling `order_id`.
#[must_use]
pub fn shipment(id: &str, order_id: &str) -> Record {
    let mut record = Record::new();
    record.set("id", id);
    record.set("order_id", order_id);
    record.set("email", "alice@example.com");
    record.set("tracking", "BR123456789");
    record.set("billing_address", address("Alice", "Silva"));
    record.set("shipping_address", address("Alice", "Silva"));
    record.set("items", Value::Array(vec![line_item("T-SHIRT-1", 2, 19.99)]));
    record
}

/// An inventory update keyed by product reference.
#[must_use]
pub fn inventory(product_id: &str, quantity: i64) -> Record {
    let mut record = Record::new();
    record.set("id", format!("{product_id}-adjust"));
    record.set("product_id", product_id);
    record.set("quantity", quantity);
    record
}
