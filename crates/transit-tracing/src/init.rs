use anyhow::{Context, Result};
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{TracerHandle, TracingConfig};

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync + 'static>;

/// Install the global tracing subscriber
///
/// Always writes JSON lines to stdout. With `otel_enabled` spans are also
/// exported over OTLP and W3C trace context is propagated through message
/// headers.
pub fn init_tracing(config: &TracingConfig) -> Result<Option<TracerHandle>> {
    let (subscriber, handle) = build_subscriber(config)?;
    subscriber
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(handle)
}

/// Assemble the subscriber stack without installing it
fn build_subscriber(config: &TracingConfig) -> Result<(BoxedSubscriber, Option<TracerHandle>)> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if !config.otel_enabled {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_list(true)
            .with_current_span(true);

        let subscriber = tracing_subscriber::registry().with(env_filter).with(fmt_layer);
        return Ok((Box::new(subscriber), None));
    }

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::new(vec![KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_NAME,
        config.service_name.clone(),
    )]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()
        .context("Failed to build OTLP span exporter")?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer("transit");
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true);

    // otel layer before fmt so log lines carry the span context
    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(fmt_layer);

    Ok((Box::new(subscriber), Some(TracerHandle { tracer_provider })))
}

/// Flush pending spans
pub fn shutdown_tracing(handle: Option<TracerHandle>) {
    if let Some(handle) = handle {
        if let Err(e) = handle.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdout_only_stack_has_no_exporter() {
        let config = TracingConfig {
            service_name: "event-worker".to_string(),
            ..Default::default()
        };

        let (subscriber, handle) = build_subscriber(&config).unwrap();

        assert!(handle.is_none());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(vehicle_id = "BUS-001", "stdout only");
        });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_otel_stack_builds_and_shuts_down() {
        let config = TracingConfig {
            service_name: "telemetry-service".to_string(),
            otel_enabled: true,
            ..Default::default()
        };

        let (subscriber, handle) = build_subscriber(&config).unwrap();

        assert!(handle.is_some());
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("publish", queue = "telemetry.events");
            let _entered = span.enter();
            tracing::info!("exported span");
        });
        shutdown_tracing(handle);
    }
}
