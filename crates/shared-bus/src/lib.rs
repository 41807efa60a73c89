//! # Shared Bus - Addressable Publish/Subscribe
//!
//! The transport port used by the publisher core and its in-process
//! implementation.
//!
//! ```text
//! ┌──────────────┐    publish()       ┌──────────────┐
//! │  Publisher   │ ─────────┐         │  Ingestor    │
//! └──────────────┘          ▼         └──────────────┘
//!                  ┌──────────────┐          ↑
//!                  │ Message Bus  │ ─────────┘
//!                  └──────────────┘  subscribe("dom/pub/+/$configure")
//! ```
//!
//! ## Security
//!
//! - **Per-Sender Replay Guard:** commands must carry strictly increasing
//!   timestamps per sender
//! - Authentication is not the bus's job; payloads are signed envelopes

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod memory;
pub mod replay_guard;
pub mod topic;
pub mod transport;

// Re-export main types
pub use memory::InMemoryMessageBus;
pub use replay_guard::{ReplayError, SenderTimestampTable};
pub use transport::{BusError, MessageHandler, MessageTransport, SubscriptionId};
