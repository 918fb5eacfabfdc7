// src/probe/mod.rs
mod client;
mod csi;

pub use client::{ProbeClient, ProbeError};
pub use csi::{IdentityClient, ProbeRequest, ProbeResponse};
