//! # Shared Types Crate
//!
//! Entities, address scheme and error types shared by every crate of the
//! publisher core.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: discovery entities and command payloads are
//!   defined here and nowhere else.
//! - **Immutable Snapshots**: registries hand out `Arc` snapshots of these
//!   types; a change always produces a new value.
//! - **Pure Addressing**: the `address` module has no state.

pub mod address;
pub mod commands;
pub mod entities;
pub mod errors;

pub use address::MessageType;
pub use commands::*;
pub use entities::*;
pub use errors::*;
