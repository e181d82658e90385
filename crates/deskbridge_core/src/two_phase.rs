//! Dependency expansion for composite records.
//!
//! The destination enforces referential order: a customer must exist before
//! an order referencing it, an item before a line selling it. Composite
//! records (orders, shipments) are therefore split at staging time into the
//! records they depend on - staged straight into pending - while the
//! composite itself parks in the two-phase stage until the next promotion
//! sweep.

use crate::object_type::ObjectType;
use deskbridge_codec::{Record, Value};

/// Synthesizes the dependent records a composite must be preceded by.
///
/// Orders expand into their customer, products, and payments. Shipments
/// expand into the same set plus the order they fulfil and a payment
/// placeholder for it (the destination bills the order, not the shipment).
/// Non-composite types expand to nothing.
pub(crate) fn expand_dependents(ty: ObjectType, record: &Record) -> Vec<(ObjectType, Record)> {
    let mut dependents = Vec::new();

    match ty {
        ObjectType::Order => {
            if let Some(customer) = build_customer(record) {
                dependents.push((ObjectType::Customer, customer));
            }
            for product in build_products(record) {
                dependents.push((ObjectType::Product, product));
            }
            for payment in build_payments(record) {
                dependents.push((ObjectType::Payment, payment));
            }
        }
        ObjectType::Shipment => {
            if let Some(customer) = build_customer(record) {
                dependents.push((ObjectType::Customer, customer));
            }
            for product in build_products(record) {
                dependents.push((ObjectType::Product, product));
            }
            if let Some(order) = build_order_from_shipment(record) {
                dependents.push((ObjectType::Order, order));
            }
            if let Some(payment) = build_payment_placeholder(record) {
                dependents.push((ObjectType::Payment, payment));
            }
        }
        _ => {}
    }

    dependents
}

/// The companion record an inventory update drags along.
///
/// The destination does not propagate quantity changes into item
/// availability, so every inventory record is paired with a product update
/// carrying the same identifier and an explicit active flag.
pub(crate) fn inventory_companion(natural_key: &str) -> Record {
    let mut product = Record::new();
    product.set("id", natural_key);
    product.set("active", true);
    product
}

/// Builds the customer implied by a composite's billing address.
fn build_customer(record: &Record) -> Option<Record> {
    let billing = record.get("billing_address")?.as_map()?;
    let firstname = text(billing.get("firstname"))?;
    let lastname = text(billing.get("lastname"))?;

    let mut customer = Record::new();
    customer.set("id", format!("{firstname} {lastname}"));
    customer.set("firstname", firstname);
    customer.set("lastname", lastname);
    if let Some(email) = record.get_text("email") {
        customer.set("email", email);
    }
    customer.set("billing_address", Value::Map(billing.clone()));
    if let Some(shipping) = record.get("shipping_address") {
        customer.set("shipping_address", shipping.clone());
    }
    Some(customer)
}

/// Builds one product per line item.
fn build_products(record: &Record) -> Vec<Record> {
    let Some(items) = line_items(record) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_map)
        .filter_map(|item| {
            let id = text(item.get("product_id"))?;
            let mut product = Record::new();
            product.set("id", id);
            if let Some(description) = text(item.get("description")) {
                product.set("description", description);
            }
            if let Some(price) = item.get("price") {
                product.set("price", price.clone());
            }
            Some(product)
        })
        .collect()
}

/// Builds one payment record per entry in the composite's payments array.
fn build_payments(record: &Record) -> Vec<Record> {
    let order_id = record.get_text("id");
    let Some(payments) = record.get("payments").and_then(Value::as_array) else {
        return Vec::new();
    };

    payments
        .iter()
        .filter_map(Value::as_map)
        .enumerate()
        .map(|(index, fields)| {
            let mut payment = Record::from(fields.clone());
            if payment.get_text("id").is_none() {
                let base = order_id.unwrap_or("payment");
                payment.set("id", format!("{}-payment-{}", base, index + 1));
            }
            if let Some(order_id) = order_id {
                payment.set("order_id", order_id);
            }
            payment
        })
        .collect()
}

/// Reconstructs the order a shipment fulfils.
fn build_order_from_shipment(record: &Record) -> Option<Record> {
    let order_id = record.get_text("order_id")?;

    let mut order = Record::new();
    order.set("id", order_id);
    for field in [
        "email",
        "billing_address",
        "shipping_address",
        "adjustments",
        "totals",
    ] {
        if let Some(value) = record.get(field) {
            order.set(field, value.clone());
        }
    }
    if let Some(items) = line_items(record) {
        order.set("line_items", Value::Array(items.to_vec()));
    }
    Some(order)
}

/// A placeholder payment against the shipment's order.
fn build_payment_placeholder(record: &Record) -> Option<Record> {
    let order_id = record.get_text("order_id")?;

    let mut payment = Record::new();
    payment.set("id", order_id);
    payment.set("order_id", order_id);
    payment.set("placeholder", true);
    if let Some(amount) = record.get("amount") {
        payment.set("amount", amount.clone());
    }
    Some(payment)
}

/// Shipments call their lines `items`; orders call them `line_items`.
fn line_items(record: &Record) -> Option<&[Value]> {
    record
        .get("line_items")
        .or_else(|| record.get("items"))
        .and_then(Value::as_array)
}

fn text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_text)
}
