mod config;

use config::ServiceConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use transit_domain::{default_fleet, TelemetryService, VehicleStateStore};
use transit_http::run_http_server;
use transit_nats::{NatsConnector, NatsEventPublisher};
use transit_runner::Runner;
use transit_tracing::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let tracer = match init_tracing(&config.tracing()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {:#}", e);
            std::process::exit(1);
        }
    };

    info!(
        queue = %config.queue_name,
        broker = %config.broker().url(),
        otel_enabled = config.otel_enabled,
        "Starting telemetry-service"
    );
    debug!("Configuration: {:?}", config);

    let store = Arc::new(VehicleStateStore::new(default_fleet()));
    let publisher = Arc::new(NatsEventPublisher::new(
        Arc::new(NatsConnector::new(config.broker())),
        config.queue(),
        config.publish_timeout(),
    ));
    let service = Arc::new(TelemetryService::new(store, publisher));

    let http_config = config.http();

    Runner::new()
        .with_named_process("http_server", move |ctx| {
            run_http_server(http_config, service, ctx)
        })
        .with_closer(move || async move {
            info!("Flushing traces");
            shutdown_tracing(tracer);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;
}
