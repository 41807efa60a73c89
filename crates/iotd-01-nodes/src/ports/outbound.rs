//! # Outbound Ports (Driven Ports)
//!
//! Callbacks into the application that owns the nodes.

use shared_types::entities::NodeAttrMap;

/// Filters configuration updates before they are applied.
///
/// Receives the command address and the requested values. Returns the
/// values to apply, or `None` to apply nothing. Without a handler every
/// requested value is passed through.
pub trait NodeConfigureHandler: Send + Sync {
    fn on_configure(&self, address: &str, params: NodeAttrMap) -> Option<NodeAttrMap>;
}

impl<F> NodeConfigureHandler for F
where
    F: Fn(&str, NodeAttrMap) -> Option<NodeAttrMap> + Send + Sync,
{
    fn on_configure(&self, address: &str, params: NodeAttrMap) -> Option<NodeAttrMap> {
        self(address, params)
    }
}
