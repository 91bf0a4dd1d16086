//! # Observability
//!
//! Prometheus metrics collection.

pub mod metrics;

pub use metrics::*;
