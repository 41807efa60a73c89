//! # Ports
//!
//! - `outbound`: application handler invoked for accepted set commands

pub mod outbound;
