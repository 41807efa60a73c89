//! # IoT Domain Publisher Runtime
//!
//! Assembles the publisher subsystems into a running publisher.
//!
//! ## Modular Structure
//!
//! - `config` - `PublisherConfig` from defaults, TOML and environment
//! - `publisher` - `Publisher` wiring and the publication loop
//! - `adapters/` - Port implementations backed by runtime services
//!
//! ## Subsystems
//!
//! 1. Node Registry (iotd-01) - nodes and configure commands
//! 2. Input Registry (iotd-02) - inputs and set commands
//! 3. Publisher Directory (iotd-03) - identities and the trust chain

pub mod adapters;
pub mod config;
pub mod publisher;

pub use config::{ConfigError, PublisherConfig};
pub use publisher::{PublishCounts, Publisher};
