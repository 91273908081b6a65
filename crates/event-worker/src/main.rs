mod config;

use config::WorkerConfig;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::{debug, info};
use transit_domain::PositionProjection;
use transit_nats::{
    ConsumeLoggingLayer, ConsumeTracingLayer, EventWorker, NatsConnector, TelemetryEventService,
};
use transit_runner::Runner;
use transit_tracing::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() {
    let config = match WorkerConfig::from_env() {
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
        consumer = %config.consumer_name,
        broker = %config.broker().url(),
        max_connect_attempts = config.max_connect_attempts,
        "Starting event-worker"
    );
    debug!("Configuration: {:?}", config);

    let projection = Arc::new(PositionProjection::new());

    // tracing outermost so the logging layer runs inside the message span
    let service = ServiceBuilder::new()
        .layer(ConsumeTracingLayer::new(config.consumer_name.clone()))
        .layer(ConsumeLoggingLayer::new())
        .service(TelemetryEventService::new(projection));

    let worker = EventWorker::new(
        Arc::new(NatsConnector::new(config.broker())),
        config.queue(),
        config.consumer(),
        config.reconnect(),
        service,
    );

    Runner::new()
        .with_named_process("event_worker", move |ctx| worker.run(ctx))
        .with_closer(move || async move {
            info!("Flushing traces");
            shutdown_tracing(tracer);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;
}
