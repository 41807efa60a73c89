//! # Domain Layer
//!
//! Node construction, the copy-on-write registry and its error types.
//! No I/O other than the persistence calls delegated to `adapters`.

pub mod errors;
pub mod node;
pub mod registry;
