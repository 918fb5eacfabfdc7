// src/health/gauge.rs
use prometheus::IntGauge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_metric(self) -> i64 {
        match self {
            HealthState::Healthy => 1,
            HealthState::Unhealthy => 0,
        }
    }

    fn from_metric(value: i64) -> Self {
        if value == 1 {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }
}

/// Write side of the liveness gauge. There is exactly one per gauge and it
/// is owned by the prober, so it is intentionally not `Clone`.
#[derive(Debug)]
pub struct HealthGauge {
    gauge: IntGauge,
}

/// Read side of the liveness gauge; clone freely.
#[derive(Debug, Clone)]
pub struct HealthReader {
    gauge: IntGauge,
}

impl HealthGauge {
    /// Wrap `gauge`, resetting it to unhealthy until a probe proves otherwise.
    pub fn new(gauge: IntGauge) -> Self {
        gauge.set(HealthState::Unhealthy.as_metric());
        Self { gauge }
    }

    pub fn set(&self, state: HealthState) {
        self.gauge.set(state.as_metric());
    }

    pub fn get(&self) -> HealthState {
        HealthState::from_metric(self.gauge.get())
    }

    pub fn reader(&self) -> HealthReader {
        HealthReader {
            gauge: self.gauge.clone(),
        }
    }
}

impl HealthReader {
    pub fn get(&self) -> HealthState {
        HealthState::from_metric(self.gauge.get())
    }
}
