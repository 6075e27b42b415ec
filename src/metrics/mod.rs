//! Optional counters for caches and the manager (feature `metrics`).

pub mod cell;
pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;
