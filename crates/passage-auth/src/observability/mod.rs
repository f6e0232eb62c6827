//! Observability for Passage authentication.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
