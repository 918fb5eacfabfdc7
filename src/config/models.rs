// src/config/models.rs
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("endpoint must not be empty")]
    EmptyEndpoint,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("probe timeout must be greater than zero")]
    ZeroProbeTimeout,

    #[error("metrics path must start with '/': {0:?}")]
    InvalidMetricsPath(String),

    #[error("invalid bind ip {0:?}")]
    InvalidBindIp(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CSI driver endpoint, `unix:///path`, `/path` or `host:port`.
    pub endpoint: String,
    pub metrics_path: String,
    pub metrics_port: u16,
    /// Address the metrics server binds; all interfaces when unset or empty.
    pub bind_ip: Option<String>,
    pub poll_interval_ms: u64,
    pub probe_timeout_ms: u64,
    pub connect_retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "unix:///tmp/csi.sock".to_string(),
            metrics_path: "/metrics".to_string(),
            metrics_port: 8080,
            bind_ip: None,
            poll_interval_ms: 60_000,
            probe_timeout_ms: 3_000,
            connect_retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroProbeTimeout);
        }
        if !self.metrics_path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics_path.clone()));
        }
        self.bind_addr()?;
        Ok(())
    }

    /// Socket address of the metrics endpoint. An absent or empty bind ip
    /// falls back to `0.0.0.0`.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = match self.bind_ip.as_deref().map(str::trim) {
            Some(ip) if !ip.is_empty() => ip
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidBindIp(ip.to_string()))?,
            _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        Ok(SocketAddr::new(ip, self.metrics_port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Zero retries forever.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            backoff_base_ms: 100,
            backoff_max_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == 0
    }
}
