// src/lib.rs
pub mod app;
pub mod config;
pub mod connection;
pub mod health;
pub mod metrics;
pub mod probe;
pub mod retry;
pub mod server;

pub use app::{Liveness, StartupError};
