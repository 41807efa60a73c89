//! # IoT Domain Publisher Test Suite
//!
//! Cross-crate flows over the in-memory message bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── command_flows.rs    # configure and set commands between publishers
//!     └── publisher_flows.rs  # trust chain, renames and persistence
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p iotd-tests
//! cargo test -p iotd-tests integration::command_flows::
//! ```

pub mod integration;
