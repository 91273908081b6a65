use crate::config::QueueConfig;
use anyhow::Result;
use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Opens broker sessions
/// Abstracts connection establishment so publishers and workers can be
/// exercised without a running broker
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Open a new connection with the configured credentials
    async fn connect(&self) -> Result<Box<dyn BrokerSession>>;
}

/// One live broker connection
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Declare the durable queue, creating it if absent
    async fn ensure_queue(&self, queue: &QueueConfig) -> Result<()>;

    /// Publish a message to a subject and await the broker's storage acknowledgment
    async fn publish(&self, subject: String, headers: HeaderMap, payload: Bytes) -> Result<()>;

    /// Create or bind a durable pull consumer on a stream
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;

    /// Flush pending writes and release the connection
    async fn close(&self) -> Result<()>;
}

/// Trait for pull consumer operations
/// Abstracts the fetch operation on a pull consumer
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    /// Fetch messages from the consumer
    /// Returns a batch of messages up to max_messages, waiting up to expires duration.
    /// An error means the connection can no longer be trusted.
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: Duration,
    ) -> Result<Vec<Box<dyn Delivery>>>;
}

/// A message dispatched to this consumer and awaiting an ack decision
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Delivery: Send + Sync {
    fn subject(&self) -> String;

    fn payload(&self) -> Bytes;

    fn headers(&self) -> Option<HeaderMap>;

    /// 1 on first delivery, higher on redelivery
    fn delivery_count(&self) -> u64;

    async fn ack(&self) -> Result<()>;

    /// Reject for redelivery after an optional delay
    async fn nak(&self, delay: Option<Duration>) -> Result<()>;
}
