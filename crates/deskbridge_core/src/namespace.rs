//! Staging namespace configuration.

/// Default origin tag when none is configured.
pub const DEFAULT_ORIGIN: &str = "primary";

/// Special handling applied to records as they are staged.
///
/// The flow flag travels with the namespace because it describes the
/// pipeline the records arrived through, not any single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Records in this pipeline cancel previously submitted orders; order
    /// payloads get their `status` forced to `cancelled` at staging time.
    CancelOrder,
}

/// The scope all staged records live inside.
///
/// A namespace pairs a connection identifier with an origin tag. The origin
/// distinguishes inbound and outbound pipelines sharing one connection, so
/// two engines on the same connection never read each other's stages.
///
/// # Example
///
/// ```
/// use deskbridge_core::Namespace;
///
/// let ns = Namespace::new("54372cb069702d1f59000000").origin("storefront");
/// assert_eq!(ns.origin, "storefront");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Identifier of the destination connection. Required.
    pub connection_id: String,

    /// Origin tag scoping this pipeline's stage prefixes.
    pub origin: String,

    /// Optional flow-level record transformation.
    pub flow: Option<Flow>,
}

impl Namespace {
    /// Creates a namespace for the given connection with the default origin.
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            origin: DEFAULT_ORIGIN.to_string(),
            flow: None,
        }
    }

    /// Sets the origin tag.
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the flow flag.
    #[must_use]
    pub fn flow(mut self, flow: Flow) -> Self {
        self.flow = Some(flow);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_origin() {
        let ns = Namespace::new("conn-1");
        assert_eq!(ns.connection_id, "conn-1");
        assert_eq!(ns.origin, "primary");
        assert_eq!(ns.flow, None);
    }

    #[test]
    fn builder_pattern() {
        let ns = Namespace::new("conn-1")
            .origin("storefront")
            .flow(Flow::CancelOrder);

        assert_eq!(ns.origin, "storefront");
        assert_eq!(ns.flow, Some(Flow::CancelOrder));
    }
}
