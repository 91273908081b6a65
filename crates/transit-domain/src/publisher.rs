use crate::envelope::EventEnvelope;
use crate::error::DomainResult;
use async_trait::async_trait;

/// Publishes change events to the durable queue
/// Infrastructure layer (e.g., transit-nats) implements this trait
///
/// Implementations report every broker, serialization or timeout problem as
/// `DomainError::PublishFailure`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: &EventEnvelope) -> DomainResult<()>;
}
