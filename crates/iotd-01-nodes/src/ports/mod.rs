//! # Ports
//!
//! - `outbound`: application callbacks driven by this subsystem

pub mod outbound;
