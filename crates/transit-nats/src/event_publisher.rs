use crate::config::QueueConfig;
use crate::conversions::encode_envelope;
use crate::trace_context::inject_trace_context;
use crate::traits::BrokerConnector;
use anyhow::{anyhow, Context, Result};
use async_nats::HeaderMap;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use transit_domain::{DomainError, DomainResult, EventEnvelope, EventPublisher};

/// Publishes envelopes to the durable queue over a fresh connection per call
///
/// Nothing is pooled: each publish connects, declares the queue, publishes,
/// waits for the broker's storage ack and closes again. The whole sequence
/// runs under one timeout.
pub struct NatsEventPublisher {
    connector: Arc<dyn BrokerConnector>,
    queue: QueueConfig,
    timeout: Duration,
}

impl NatsEventPublisher {
    pub fn new(connector: Arc<dyn BrokerConnector>, queue: QueueConfig, timeout: Duration) -> Self {
        debug!(
            queue = %queue.name,
            timeout_ms = timeout.as_millis(),
            "Created NatsEventPublisher"
        );
        Self {
            connector,
            queue,
            timeout,
        }
    }

    async fn publish_once(&self, payload: Vec<u8>) -> Result<()> {
        let session = self.connector.connect().await?;

        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        let published = async {
            session.ensure_queue(&self.queue).await?;
            session
                .publish(self.queue.subject().to_string(), headers, payload.into())
                .await
        }
        .await;

        // release the connection whatever happened
        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close publisher connection");
        }

        published
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    #[instrument(skip(self, envelope), fields(queue = %self.queue.name, vehicle_id = %envelope.payload.vehicle_id))]
    async fn publish(&self, envelope: &EventEnvelope) -> DomainResult<()> {
        let payload = encode_envelope(envelope).map_err(DomainError::PublishFailure)?;

        debug!(
            event_type = %envelope.event_type,
            size_bytes = payload.len(),
            "Publishing envelope"
        );

        tokio::time::timeout(self.timeout, self.publish_once(payload))
            .await
            .map_err(|_| anyhow!("publish timed out after {}ms", self.timeout.as_millis()))
            .and_then(|result| result)
            .context("Failed to publish envelope")
            .map_err(DomainError::PublishFailure)?;

        debug!(event_type = %envelope.event_type, "Envelope durably queued");
        Ok(())
    }
}
