// src/metrics/mod.rs
mod registry;

pub use registry::{MetricsRegistry, LIVENESS_NAME, LIVENESS_NAMESPACE};
