// src/metrics/registry.rs
use crate::health::HealthGauge;
use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};

pub const LIVENESS_NAMESPACE: &str = "csi";
pub const LIVENESS_NAME: &str = "liveness";

/// Owns the metrics exposed by the sidecar.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self { registry })
    }

    /// Register the `csi_liveness` gauge and hand back its single writer.
    /// Fails if the gauge is already registered.
    pub fn register_liveness(&self) -> prometheus::Result<HealthGauge> {
        let gauge = IntGauge::with_opts(
            Opts::new(LIVENESS_NAME, "Liveness Probe").namespace(LIVENESS_NAMESPACE),
        )?;
        self.registry.register(Box::new(gauge.clone()))?;
        Ok(HealthGauge::new(gauge))
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn gather(&self) -> prometheus::Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthState;

    fn render(registry: &MetricsRegistry) -> String {
        String::from_utf8(registry.gather().unwrap()).unwrap()
    }

    #[test]
    fn test_liveness_rendered_as_gauge() {
        let registry = MetricsRegistry::new().unwrap();
        let gauge = registry.register_liveness().unwrap();

        let body = render(&registry);
        assert!(body.contains("# HELP csi_liveness Liveness Probe"));
        assert!(body.contains("# TYPE csi_liveness gauge"));
        assert!(body.contains("\ncsi_liveness 0\n"));

        gauge.set(HealthState::Healthy);
        assert!(render(&registry).contains("\ncsi_liveness 1\n"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = MetricsRegistry::new().unwrap();
        let _gauge = registry.register_liveness().unwrap();

        assert!(matches!(
            registry.register_liveness(),
            Err(prometheus::Error::AlreadyReg)
        ));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = MetricsRegistry::new().unwrap();
        let second = MetricsRegistry::new().unwrap();

        first.register_liveness().unwrap().set(HealthState::Healthy);
        second.register_liveness().unwrap();

        assert!(render(&first).contains("\ncsi_liveness 1\n"));
        assert!(render(&second).contains("\ncsi_liveness 0\n"));
    }

    #[test]
    fn test_content_type_is_text_format() {
        let registry = MetricsRegistry::new().unwrap();
        assert!(registry.content_type().starts_with("text/plain"));
    }
}
