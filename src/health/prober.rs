// src/health/prober.rs
use crate::health::{HealthGauge, HealthState};
use crate::probe::{ProbeClient, ProbeError};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info};

#[derive(Debug)]
pub enum ProbeOutcome {
    Ready,
    NotReady,
    Error(ProbeError),
}

impl ProbeOutcome {
    pub fn health(&self) -> HealthState {
        match self {
            ProbeOutcome::Ready => HealthState::Healthy,
            ProbeOutcome::NotReady | ProbeOutcome::Error(_) => HealthState::Unhealthy,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready)
    }
}

/// Runs one bounded probe per cycle and records the result in the gauge.
pub struct Prober<C> {
    client: C,
    gauge: HealthGauge,
    timeout: Duration,
}

impl<C: ProbeClient> Prober<C> {
    pub fn new(client: C, gauge: HealthGauge, timeout: Duration) -> Self {
        Self {
            client,
            gauge,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue a single probe. Never retries and never fails: every failure
    /// mode is folded into an unhealthy gauge value.
    pub async fn run_cycle(&self) -> ProbeOutcome {
        let start = Instant::now();
        debug!("Sending probe request to CSI driver");

        let outcome = match timeout(self.timeout, self.client.probe(self.timeout)).await {
            Ok(Ok(true)) => ProbeOutcome::Ready,
            Ok(Ok(false)) => ProbeOutcome::NotReady,
            Ok(Err(e)) => ProbeOutcome::Error(e),
            Err(_) => ProbeOutcome::Error(ProbeError::DeadlineExceeded(self.timeout)),
        };

        self.gauge.set(outcome.health());

        let elapsed = start.elapsed();
        match &outcome {
            ProbeOutcome::Ready => info!(?elapsed, "Health check succeeded"),
            ProbeOutcome::NotReady => error!(?elapsed, "driver responded but is not ready"),
            ProbeOutcome::Error(e) => error!(?elapsed, error = %e, "health check failed"),
        }

        outcome
    }
}
