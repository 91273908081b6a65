use crate::config::{BrokerConfig, QueueConfig};
use crate::traits::{BrokerConnector, BrokerSession, Delivery, PullConsumer};
use anyhow::{anyhow, Context, Result};
use async_nats::jetstream::{
    self,
    stream::{Config as StreamConfig, RetentionPolicy, StorageType},
    AckKind,
};
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let url = config.url();
        debug!(
            url = %url,
            user = %config.user,
            timeout_ms = config.connect_timeout.as_millis(),
            "Connecting to NATS"
        );

        let mut options =
            async_nats::ConnectOptions::new().connection_timeout(config.connect_timeout);
        if !config.user.is_empty() {
            options = options.user_and_password(config.user.clone(), config.password.clone());
        }

        let client = options
            .connect(url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        debug!(url = %url, "Connected to NATS");
        Ok(Self { client, jetstream })
    }

    /// Declare the durable queue stream.
    ///
    /// File storage keeps messages across broker restarts; work-queue
    /// retention removes a message once a consumer acknowledges it.
    pub async fn ensure_queue(&self, queue: &QueueConfig) -> Result<()> {
        let stream_name = queue.stream_name();
        debug!(stream = %stream_name, subject = %queue.subject(), "Ensuring queue stream exists");

        match self.jetstream.get_stream(&stream_name).await {
            Ok(_) => {
                debug!(stream = %stream_name, "Stream already exists");
            }
            Err(_) => {
                let stream_config = StreamConfig {
                    name: stream_name.clone(),
                    subjects: vec![queue.subject().to_string()],
                    description: Some(format!("Durable queue for {}", queue.name)),
                    retention: RetentionPolicy::WorkQueue,
                    storage: StorageType::File,
                    ..Default::default()
                };

                self.jetstream
                    .create_stream(stream_config)
                    .await
                    .context("Failed to create stream")?;
                info!(stream = %stream_name, "Created stream");
            }
        }

        Ok(())
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    pub async fn close(self) -> Result<()> {
        debug!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        Ok(())
    }
}

/// Connector that dials NATS with a fixed configuration
pub struct NatsConnector {
    config: BrokerConfig,
}

impl NatsConnector {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrokerConnector for NatsConnector {
    async fn connect(&self) -> Result<Box<dyn BrokerSession>> {
        let client = NatsClient::connect(&self.config).await?;
        Ok(Box::new(NatsSession { client }))
    }
}

/// Concrete implementation of BrokerSession over one NATS connection
pub struct NatsSession {
    client: NatsClient,
}

#[async_trait]
impl BrokerSession for NatsSession {
    async fn ensure_queue(&self, queue: &QueueConfig) -> Result<()> {
        self.client.ensure_queue(queue).await
    }

    #[instrument(skip(self, headers, payload), fields(subject = %subject, payload_size = payload.len()))]
    async fn publish(&self, subject: String, headers: HeaderMap, payload: Bytes) -> Result<()> {
        let ack = self
            .client
            .jetstream()
            .publish_with_headers(subject, headers, payload)
            .await
            .context("Failed to publish message to JetStream")?;

        ack.await
            .context("Failed to receive JetStream acknowledgment")?;
        Ok(())
    }

    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>> {
        let consumer = self
            .client
            .jetstream()
            .create_consumer_on_stream(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        Ok(Box::new(NatsPullConsumer { consumer }))
    }

    async fn close(&self) -> Result<()> {
        self.client
            .client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        Ok(())
    }
}

/// Concrete implementation of PullConsumer using async-nats
pub struct NatsPullConsumer {
    consumer: jetstream::consumer::PullConsumer,
}

#[async_trait]
impl PullConsumer for NatsPullConsumer {
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: Duration,
    ) -> Result<Vec<Box<dyn Delivery>>> {
        use futures::StreamExt;

        let mut messages = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(expires)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        // a broken batch fails the whole fetch; messages already pulled stay
        // unacked and are redelivered after the ack wait
        let mut result: Vec<Box<dyn Delivery>> = Vec::new();
        while let Some(msg) = messages.next().await {
            let message = msg.map_err(|e| {
                error!(error = %e, received = result.len(), "Error receiving message");
                anyhow!(e).context("Failed to receive message from batch")
            })?;
            result.push(Box::new(NatsDelivery { message }));
        }
        Ok(result)
    }
}

/// A JetStream message awaiting acknowledgment
pub struct NatsDelivery {
    message: jetstream::Message,
}

#[async_trait]
impl Delivery for NatsDelivery {
    fn subject(&self) -> String {
        self.message.subject.to_string()
    }

    fn payload(&self) -> Bytes {
        self.message.payload.clone()
    }

    fn headers(&self) -> Option<HeaderMap> {
        self.message.headers.clone()
    }

    fn delivery_count(&self) -> u64 {
        self.message
            .info()
            .map(|info| info.delivered.max(1) as u64)
            .unwrap_or(1)
    }

    async fn ack(&self) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| anyhow!("Failed to acknowledge message: {}", e))
    }

    async fn nak(&self, delay: Option<Duration>) -> Result<()> {
        self.message
            .ack_with(AckKind::Nak(delay))
            .await
            .map_err(|e| anyhow!("Failed to reject message: {}", e))
    }
}
