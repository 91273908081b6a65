use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;

/// How a transit binary logs and whether it exports spans
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Reported as `service.name` on exported spans
    pub service_name: String,
    /// OTLP gRPC collector
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "transit".to_string(),
            otel_endpoint: "http://localhost:4317".to_string(),
            otel_enabled: false,
            log_level: "info".to_string(),
        }
    }
}

/// Returned by `init_tracing` when spans are exported; pass it to
/// `shutdown_tracing` on exit so the last batch is flushed
pub struct TracerHandle {
    pub tracer_provider: SdkTracerProvider,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_log_to_stdout_only() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "transit");
        assert_eq!(config.log_level, "info");
        assert!(!config.otel_enabled);
    }
}
