// src/app.rs
//! Startup sequencing: connect, register, bind, then probe and serve.

use crate::config::{Config, ConfigError};
use crate::connection::{self, ConnectionError};
use crate::health::{HealthReader, Prober, Scheduler};
use crate::metrics::MetricsRegistry;
use crate::probe::{IdentityClient, ProbeClient};
use crate::server::{bind_tcp, ExpositionServer, MetricsHandler};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Failures that abort startup. None of them occur once probing has begun.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to establish connection to CSI driver: {0}")]
    Connection(#[from] ConnectionError),

    #[error("failed to register metrics: {0}")]
    Registration(#[from] prometheus::Error),

    #[error("failed to bind metrics server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// A sidecar whose metrics are registered and whose listener is bound, but
/// which has not started probing yet.
pub struct Liveness<C> {
    config: Config,
    prober: Prober<C>,
    health: HealthReader,
    server: ExpositionServer,
}

impl<C: ProbeClient + 'static> Liveness<C> {
    /// Register the liveness gauge and bind the metrics listener. A failure
    /// here means no probe cycle will ever run.
    pub async fn bind(config: Config, client: C) -> Result<Self, StartupError> {
        config.validate()?;
        Self::bind_validated(config, client).await
    }

    async fn bind_validated(config: Config, client: C) -> Result<Self, StartupError> {
        if config.probe_timeout() > config.poll_interval() {
            warn!(
                "Probe timeout {:?} exceeds poll interval {:?}; late cycles will skip ticks",
                config.probe_timeout(),
                config.poll_interval()
            );
        }

        let registry = MetricsRegistry::new()?;
        let gauge = registry.register_liveness()?;
        let health = gauge.reader();

        let addr = config.bind_addr()?;
        if config.bind_ip.as_deref().map_or(true, |ip| ip.trim().is_empty()) {
            warn!("missing POD_IP env var, defaulting to {}", addr.ip());
        }
        let listener = bind_tcp(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;

        let handler = MetricsHandler::new(registry, config.metrics_path.as_str());
        let server = ExpositionServer::new(listener, handler);
        let prober = Prober::new(client, gauge, config.probe_timeout());

        Ok(Self {
            config,
            prober,
            health,
            server,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, StartupError> {
        self.server.local_addr().map_err(StartupError::Serve)
    }

    pub fn health(&self) -> HealthReader {
        self.health.clone()
    }

    /// Launch the scheduler and serve metrics until `shutdown` fires. The
    /// scheduler is stopped before this returns, whichever side ends first.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), StartupError> {
        let scheduler = Scheduler::new(self.prober, self.config.poll_interval());
        let probe_task = scheduler.spawn(shutdown.child_token());

        self.server.serve(shutdown.clone()).await;

        probe_task.abort();
        let _ = probe_task.await;

        Ok(())
    }
}

/// Full process lifecycle against a real CSI driver.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), StartupError> {
    info!("Liveness Running");
    config.validate()?;

    let channel = tokio::select! {
        _ = shutdown.cancelled() => {
            info!("Shutdown requested before the CSI driver became reachable");
            return Ok(());
        }
        channel = connection::connect(&config.endpoint, &config.connect_retry) => channel?,
    };

    let liveness = Liveness::bind_validated(config, IdentityClient::new(channel)).await?;
    liveness.run(shutdown).await
}
