#![cfg(feature = "integration-tests")]

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use transit_domain::{EventEnvelope, EventPublisher, PositionProjection, VehicleSnapshot};
use transit_nats::{
    BrokerConfig, BrokerConnector, ConsumerSettings, EventWorker, NatsConnector,
    NatsEventPublisher, QueueConfig, ReconnectPolicy, TelemetryEventService,
};

async fn start_nats() -> (ContainerAsync<GenericImage>, BrokerConfig) {
    let container = GenericImage::new("nats", "latest")
        .with_exposed_port(4222.into())
        .with_cmd(["-js"])
        .start()
        .await
        .unwrap();

    let config = BrokerConfig {
        host: container.get_host().await.unwrap().to_string(),
        port: container.get_host_port_ipv4(4222).await.unwrap(),
        user: String::new(),
        password: String::new(),
        connect_timeout: Duration::from_secs(5),
    };

    (container, config)
}

fn telemetry(occupancy: u8) -> EventEnvelope {
    EventEnvelope::telemetry_updated(VehicleSnapshot {
        vehicle_id: "BUS-001".to_string(),
        latitude: -0.19,
        longitude: -78.47,
        occupancy,
        last_updated_utc: Some(Utc::now()),
        sequence: 1,
    })
}

#[tokio::test]
async fn test_published_event_reaches_worker() {
    let (_container, config) = start_nats().await;
    let connector: Arc<dyn BrokerConnector> = Arc::new(NatsConnector::new(config));
    let queue = QueueConfig::new("telemetry.it");

    let publisher =
        NatsEventPublisher::new(Arc::clone(&connector), queue.clone(), Duration::from_secs(5));
    publisher.publish(&telemetry(40)).await.unwrap();

    let projection = Arc::new(PositionProjection::new());
    let ctx = CancellationToken::new();
    let worker = EventWorker::new(
        Arc::clone(&connector),
        queue,
        ConsumerSettings {
            fetch_wait: Duration::from_millis(500),
            ..Default::default()
        },
        ReconnectPolicy::default(),
        TelemetryEventService::new(projection.clone()),
    );
    let handle = tokio::spawn(worker.run(ctx.clone()));

    timeout(Duration::from_secs(10), async {
        while projection.latest("BUS-001").await.is_none() {
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("event was not consumed");

    assert_eq!(projection.latest("BUS-001").await.unwrap().occupancy, 40);

    ctx.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_publish_to_unreachable_broker_fails() {
    let connector = Arc::new(NatsConnector::new(BrokerConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        connect_timeout: Duration::from_millis(200),
        ..Default::default()
    }));
    let publisher = NatsEventPublisher::new(connector, QueueConfig::default(), Duration::from_secs(2));

    let result = publisher.publish(&telemetry(10)).await;

    assert!(matches!(
        result,
        Err(transit_domain::DomainError::PublishFailure(_))
    ));
}
