// src/probe/client.rs
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("probe rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("transport not ready: {0}")]
    Transport(#[source] tonic::transport::Error),

    #[error("{0}")]
    Other(String),
}

/// The single RPC the prober depends on.
///
/// Returns `Ok(true)` when the driver reports ready, `Ok(false)` when it
/// answers but is not ready, and an error for anything else. `deadline` is
/// a hint for propagating the timeout; the caller enforces it regardless.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn probe(&self, deadline: Duration) -> Result<bool, ProbeError>;
}

#[async_trait]
impl<C: ProbeClient + ?Sized> ProbeClient for Arc<C> {
    async fn probe(&self, deadline: Duration) -> Result<bool, ProbeError> {
        (**self).probe(deadline).await
    }
}
