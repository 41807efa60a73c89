//! # Node Registry Subsystem (IOTD-01)
//!
//! Keeps the nodes a publisher represents and applies remote configuration.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): node construction, copy-on-write registry
//! - **Ports Layer** (`ports/`): application callback for configure commands
//! - **Service Layer** (`service.rs`): secure configure command ingestion
//! - **Adapters** (`adapters/`): JSON file persistence
//!
//! ## Security Notes
//!
//! - Configure commands must be signed by a known sender and encrypted to
//!   this publisher; anything else is rejected before the registry is locked
//! - The node is resolved by the node ID segment of the command address and
//!   updated by hardware ID

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::errors::PersistenceError;
pub use domain::node::{default_config, new_node, ConfigValue};
pub use domain::registry::{NodeUpdate, RegisteredNodes};
pub use ports::outbound::NodeConfigureHandler;
pub use service::ReceiveNodeConfigure;
