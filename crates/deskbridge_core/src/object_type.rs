//! Business object types and their per-type staging behavior.

use deskbridge_codec::Record;
use std::fmt;

/// Longest natural key the destination's identifier field accepts for
/// order-numbered types.
pub const NATURAL_KEY_LIMIT: usize = 11;

/// The closed set of business entity types this pipeline stages.
///
/// All per-type behavior - storage tokens, identity field, dispatch
/// precedence, two-phase expansion - is a lookup on this enum. The set is
/// fixed by the destination application's record model; there is no open
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    /// A sales order.
    Order,
    /// A customer account.
    Customer,
    /// A sellable product.
    Product,
    /// An outbound shipment.
    Shipment,
    /// A received payment.
    Payment,
    /// An inventory adjustment document.
    Adjustment,
    /// A merchandise return.
    Return,
    /// An inventory quantity update.
    Inventory,
}

impl ObjectType {
    /// Every object type.
    pub const ALL: [ObjectType; 8] = [
        ObjectType::Order,
        ObjectType::Customer,
        ObjectType::Product,
        ObjectType::Shipment,
        ObjectType::Payment,
        ObjectType::Adjustment,
        ObjectType::Return,
        ObjectType::Inventory,
    ];

    /// The plural token used in storage keys.
    #[must_use]
    pub fn plural(self) -> &'static str {
        match self {
            ObjectType::Order => "orders",
            ObjectType::Customer => "customers",
            ObjectType::Product => "products",
            ObjectType::Shipment => "shipments",
            ObjectType::Payment => "payments",
            ObjectType::Adjustment => "adjustments",
            ObjectType::Return => "returns",
            ObjectType::Inventory => "inventories",
        }
    }

    /// The singular name, used in messages.
    #[must_use]
    pub fn singular(self) -> &'static str {
        match self {
            ObjectType::Order => "order",
            ObjectType::Customer => "customer",
            ObjectType::Product => "product",
            ObjectType::Shipment => "shipment",
            ObjectType::Payment => "payment",
            ObjectType::Adjustment => "adjustment",
            ObjectType::Return => "return",
            ObjectType::Inventory => "inventory",
        }
    }

    /// Resolves a plural storage token back to its type.
    #[must_use]
    pub fn from_plural(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.plural() == token)
    }

    /// Extracts the record's natural key.
    ///
    /// Customers are keyed by email, shipments by the order they fulfil,
    /// inventories by product reference (falling back to the generic
    /// identifier), everything else by the generic identifier field.
    #[must_use]
    pub fn natural_key(self, record: &Record) -> Option<String> {
        let key = match self {
            ObjectType::Customer => record.get_text("email"),
            ObjectType::Shipment => record.get_text("order_id"),
            ObjectType::Inventory => record
                .get_text("product_id")
                .or_else(|| record.get_text("id")),
            _ => record.get_text("id"),
        };
        key.filter(|k| !k.is_empty()).map(str::to_string)
    }

    /// The dispatch precedence tier (lower dispatches first).
    ///
    /// Tier 1 holds the types other records reference; tier 2 the
    /// composites that reference them. Anything else waits for both to
    /// drain.
    #[must_use]
    pub fn precedence_tier(self) -> u8 {
        match self {
            ObjectType::Customer
            | ObjectType::Product
            | ObjectType::Adjustment
            | ObjectType::Inventory
            | ObjectType::Payment => 1,
            ObjectType::Order | ObjectType::Return => 2,
            ObjectType::Shipment => 3,
        }
    }

    /// True for composite types staged in two phases.
    #[must_use]
    pub fn is_two_phase(self) -> bool {
        matches!(self, ObjectType::Order | ObjectType::Shipment)
    }

    /// The destination identifier length bound, where one applies.
    ///
    /// Orders and returns land in a fixed-width reference field on the
    /// destination side; keys past the bound are rejected at staging time.
    #[must_use]
    pub fn natural_key_limit(self) -> Option<usize> {
        match self {
            ObjectType::Order | ObjectType::Return => Some(NATURAL_KEY_LIMIT),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}
