mod client;
mod config;
mod consume;
mod conversions;
mod event_publisher;
mod middleware;
mod telemetry_event_service;
mod trace_context;
mod traits;
mod worker;

pub use client::{NatsClient, NatsConnector, NatsDelivery, NatsPullConsumer, NatsSession};
pub use config::{BrokerConfig, ConsumerSettings, QueueConfig, ReconnectPolicy};
pub use consume::{ConsumeRequest, ConsumeResponse};
pub use conversions::{decode_envelope, encode_envelope, EnvelopeMessage, SnapshotMessage};
pub use event_publisher::NatsEventPublisher;
pub use middleware::*;
pub use telemetry_event_service::TelemetryEventService;
pub use trace_context::{extract_trace_context, inject_trace_context, set_parent_from_headers};
pub use traits::{BrokerConnector, BrokerSession, Delivery, PullConsumer};
pub use worker::{EventWorker, WorkerError};

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use traits::{MockBrokerConnector, MockBrokerSession, MockDelivery, MockPullConsumer};
