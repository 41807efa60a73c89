//! # Integration Flows
//!
//! Every flow runs real publishers wired by `publisher-runtime` on one
//! `InMemoryMessageBus`. Commands are built the way a remote publisher
//! would: signed with its key, then encrypted to the target publisher.

pub mod command_flows;
pub mod publisher_flows;

#[cfg(test)]
mod support {
    use publisher_runtime::{Publisher, PublisherConfig};
    use shared_bus::InMemoryMessageBus;
    use shared_crypto::Secp256k1KeyPair;
    use std::sync::Arc;

    /// Domain used by all flows.
    pub const DOMAIN: &str = "test";

    /// Configuration of a publisher in the test domain.
    pub fn config(publisher_id: &str) -> PublisherConfig {
        PublisherConfig {
            domain: DOMAIN.to_string(),
            publisher_id: publisher_id.to_string(),
            publish_interval_ms: 10,
            ..PublisherConfig::default()
        }
    }

    /// A started publisher on `bus`.
    pub fn started(bus: &Arc<InMemoryMessageBus>, config: PublisherConfig) -> Publisher {
        let publisher =
            Publisher::new(config, bus.clone(), Secp256k1KeyPair::generate()).unwrap();
        publisher.start().unwrap();
        publisher
    }
}
