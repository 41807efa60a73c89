//! # Input Registry Subsystem (IOTD-02)
//!
//! Inputs of the publisher's nodes and secure set command ingestion.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): input registry with per-input handlers
//! - **Ports Layer** (`ports/`): `InputHandler` application callback
//! - **Service Layer** (`service.rs`): `$set` subscriptions, decoding,
//!   replay protection and dispatch
//!
//! ## Security Notes
//!
//! - Set commands must be signed by a known sender and encrypted to this
//!   publisher
//! - Per-sender strictly increasing timestamps; equal timestamps are replays

pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::registry::{InputUpdate, RegisteredInputs};
pub use ports::outbound::InputHandler;
pub use service::InputFromSetCommands;
