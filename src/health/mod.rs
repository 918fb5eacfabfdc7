// src/health/mod.rs
mod gauge;
mod prober;
mod scheduler;

pub use gauge::{HealthGauge, HealthReader, HealthState};
pub use prober::{ProbeOutcome, Prober};
pub use scheduler::Scheduler;
