// src/health/scheduler.rs
use crate::health::Prober;
use crate::probe::ProbeClient;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Drives the prober on a fixed cadence until cancelled.
pub struct Scheduler<C> {
    prober: Prober<C>,
    interval: Duration,
}

impl<C: ProbeClient + 'static> Scheduler<C> {
    pub fn new(prober: Prober<C>, interval: Duration) -> Self {
        Self { prober, interval }
    }

    /// Launch the loop on its own task.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Probe immediately, then once per interval. A cycle only starts after
    /// the previous one returned; ticks missed by a slow cycle are skipped.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Starting liveness probe with interval {:?} and timeout {:?}",
            self.interval,
            self.prober.timeout()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // An in-flight cycle is abandoned on shutdown without touching the gauge.
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.prober.run_cycle() => {}
            }
        }

        info!("Liveness probe shutting down");
    }
}
