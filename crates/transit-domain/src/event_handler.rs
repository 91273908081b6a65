use crate::envelope::EventEnvelope;
use crate::error::DomainResult;
use async_trait::async_trait;

/// What a handler did with a delivered event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The event changed local state
    Applied,
    /// Duplicate or stale delivery, nothing changed
    Skipped,
}

/// Application-level handling of events pulled off the queue
///
/// Delivery is at-least-once, so implementations must tolerate seeing the
/// same envelope more than once. Returning an error leaves the message
/// unacknowledged for redelivery.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelemetryEventHandler: Send + Sync {
    async fn handle(&self, envelope: &EventEnvelope) -> DomainResult<HandleOutcome>;
}
