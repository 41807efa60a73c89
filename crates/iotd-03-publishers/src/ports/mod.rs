//! # Ports
//!
//! - `outbound`: observer of trust chain decisions

pub mod outbound;
