// src/config/cli.rs
use super::{load_config, Config};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Probe a CSI driver and publish its liveness as a Prometheus gauge.
#[derive(Debug, Parser)]
#[command(name = "csi-liveness", version)]
pub struct Cli {
    /// Optional YAML or JSON config file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// CSI endpoint, e.g. unix:///csi/csi.sock
    #[arg(long, env = "CSI_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub metrics_port: Option<u16>,

    #[arg(long)]
    pub metrics_path: Option<String>,

    /// Interval between probe cycles, in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Deadline of a single probe, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// IP the metrics server binds to
    #[arg(long, env = "POD_IP")]
    pub bind_ip: Option<String>,
}

impl Cli {
    /// Resolve the final configuration: defaults, then the config file,
    /// then flags and environment. Validation is left to startup.
    pub async fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                load_config(path).await?
            }
            None => Config::default(),
        };

        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(path) = self.metrics_path {
            config.metrics_path = path;
        }
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
        if let Some(timeout) = self.timeout_ms {
            config.probe_timeout_ms = timeout;
        }
        if let Some(ip) = self.bind_ip {
            config.bind_ip = Some(ip);
        }

        Ok(config)
    }
}
