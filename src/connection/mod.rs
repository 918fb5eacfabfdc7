// src/connection/mod.rs
//! Connection handle to the CSI driver.
//!
//! The endpoint string is parsed once; a malformed endpoint is a
//! configuration error and fails immediately, as does a unix socket whose
//! directory does not exist. Other transport failures while dialing are
//! retried with backoff until the driver accepts the connection or the
//! retry budget runs out.

use crate::config::RetryConfig;
use crate::retry::{RetryDecision, RetryStrategy};
use hyper_util::rt::TokioIo;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint as TonicEndpoint, Uri};
use tower::service_fn;
use tracing::info;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Placeholder authority for unix sockets; the connector ignores it.
const UNIX_AUTHORITY: &str = "http://[::]:50051";

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid CSI endpoint {endpoint:?}: {reason}")]
    Misconfigured { endpoint: String, reason: String },

    #[error("CSI driver at {endpoint} is unavailable: {source}")]
    Unavailable {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },
}

impl ConnectionError {
    fn misconfigured(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::Misconfigured {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::Misconfigured { .. })
    }
}

/// Parsed CSI endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsiEndpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl fmt::Display for CsiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsiEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            CsiEndpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

impl FromStr for CsiEndpoint {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ConnectionError::misconfigured(s, "empty endpoint"));
        }

        if raw.starts_with('/') {
            return Ok(CsiEndpoint::Unix(PathBuf::from(raw)));
        }

        if !raw.contains("://") {
            return parse_host_port(s, raw);
        }

        let url = Url::parse(raw).map_err(|e| ConnectionError::misconfigured(s, e.to_string()))?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    return Err(ConnectionError::misconfigured(s, "missing socket path"));
                }
                Ok(CsiEndpoint::Unix(PathBuf::from(path)))
            }
            "tcp" => {
                let rest = &raw["tcp://".len()..];
                parse_host_port(s, rest.trim_end_matches('/'))
            }
            other => Err(ConnectionError::misconfigured(
                s,
                format!("unsupported scheme {:?}", other),
            )),
        }
    }
}

fn parse_host_port(input: &str, addr: &str) -> Result<CsiEndpoint, ConnectionError> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ConnectionError::misconfigured(input, "expected host:port"))?;
    if host.is_empty() {
        return Err(ConnectionError::misconfigured(input, "missing host"));
    }
    port.parse::<u16>()
        .map_err(|_| ConnectionError::misconfigured(input, format!("invalid port {:?}", port)))?;
    Ok(CsiEndpoint::Tcp(addr.to_string()))
}

impl CsiEndpoint {
    fn tonic_endpoint(&self) -> Result<TonicEndpoint, ConnectionError> {
        let uri = match self {
            CsiEndpoint::Unix(_) => UNIX_AUTHORITY.to_string(),
            CsiEndpoint::Tcp(addr) => format!("http://{}", addr),
        };
        let endpoint = TonicEndpoint::from_shared(uri)
            .map_err(|e| ConnectionError::misconfigured(&self.to_string(), e.to_string()))?;
        Ok(endpoint.connect_timeout(CONNECT_TIMEOUT))
    }

    async fn dial(&self, endpoint: &TonicEndpoint) -> Result<Channel, tonic::transport::Error> {
        match self {
            CsiEndpoint::Unix(path) => {
                let path = path.clone();
                endpoint
                    .connect_with_connector(service_fn(move |_: Uri| {
                        let path = path.clone();
                        async move {
                            Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?))
                        }
                    }))
                    .await
            }
            CsiEndpoint::Tcp(_) => endpoint.connect().await,
        }
    }

    /// A missing socket directory never heals on its own: the driver
    /// creates the socket, not its parent.
    fn missing_socket_dir(&self) -> Option<&Path> {
        match self {
            CsiEndpoint::Unix(path) => path.parent().filter(|dir| !dir.is_dir()),
            CsiEndpoint::Tcp(_) => None,
        }
    }

    fn retry_decision(&self) -> RetryDecision {
        if self.missing_socket_dir().is_some() {
            RetryDecision::NoRetry
        } else {
            RetryDecision::Retry
        }
    }
}

/// Establish the connection handle. Blocks until the driver is reachable;
/// only a misconfigured endpoint or an exhausted bounded retry budget errors.
pub async fn connect(endpoint: &str, retry: &RetryConfig) -> Result<Channel, ConnectionError> {
    let target: CsiEndpoint = endpoint.parse()?;
    let tonic_endpoint = target.tonic_endpoint()?;
    info!("Connecting to CSI driver at {}", target);

    let strategy = RetryStrategy::new(retry.clone());
    let channel = strategy
        .execute_with_decision(|| target.dial(&tonic_endpoint), |_| target.retry_decision())
        .await
        .map_err(|source| match target.missing_socket_dir() {
            Some(dir) => ConnectionError::misconfigured(
                endpoint,
                format!("socket directory {} does not exist: {}", dir.display(), source),
            ),
            None => ConnectionError::Unavailable {
                endpoint: target.to_string(),
                source,
            },
        })?;

    info!("Connected to CSI driver at {}", target);
    Ok(channel)
}
