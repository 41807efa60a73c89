//! # Adapters
//!
//! - `json_file`: node list persistence

pub mod json_file;
