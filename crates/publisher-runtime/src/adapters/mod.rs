//! # Adapters
//!
//! Port implementations connecting the subsystems to runtime services.

pub mod metrics;

pub use metrics::MetricsObserver;
