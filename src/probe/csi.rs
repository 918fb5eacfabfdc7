// src/probe/csi.rs
//! Minimal client for the CSI `Identity.Probe` RPC.

use super::client::{ProbeClient, ProbeError};
use async_trait::async_trait;
use std::time::Duration;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

const PROBE_PATH: &str = "/csi.v1.Identity/Probe";

/// `csi.v1.ProbeRequest`
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ProbeRequest {}

/// `csi.v1.ProbeResponse`
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ProbeResponse {
    /// `google.protobuf.BoolValue ready = 1`
    #[prost(message, optional, tag = "1")]
    pub ready: Option<bool>,
}

impl ProbeResponse {
    /// A plugin that leaves `ready` unset is considered ready.
    pub fn is_ready(&self) -> bool {
        self.ready.unwrap_or(true)
    }
}

/// gRPC client for the CSI Identity service.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    inner: tonic::client::Grpc<Channel>,
}

impl IdentityClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn call_probe(&self, deadline: Duration) -> Result<ProbeResponse, ProbeError> {
        // Channel clones share the underlying connection.
        let mut grpc = self.inner.clone();
        grpc.ready().await.map_err(ProbeError::Transport)?;

        let mut request = tonic::Request::new(ProbeRequest {});
        request.set_timeout(deadline);

        let response = grpc
            .unary(
                request,
                PathAndQuery::from_static(PROBE_PATH),
                ProstCodec::default(),
            )
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl ProbeClient for IdentityClient {
    async fn probe(&self, deadline: Duration) -> Result<bool, ProbeError> {
        let response = self.call_probe(deadline).await?;
        Ok(response.is_ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_unset_ready_means_ready() {
        let response = ProbeResponse::decode(&[][..]).unwrap();
        assert_eq!(response.ready, None);
        assert!(response.is_ready());
    }

    #[test]
    fn test_explicit_ready_value() {
        // field 1, length-delimited, BoolValue { value: false }
        let not_ready = ProbeResponse::decode(&[0x0a, 0x00][..]).unwrap();
        assert_eq!(not_ready.ready, Some(false));
        assert!(!not_ready.is_ready());

        // BoolValue { value: true }
        let ready = ProbeResponse::decode(&[0x0a, 0x02, 0x08, 0x01][..]).unwrap();
        assert!(ready.is_ready());
    }

    #[test]
    fn test_probe_request_is_empty_on_the_wire() {
        assert!(ProbeRequest {}.encode_to_vec().is_empty());
    }
}
