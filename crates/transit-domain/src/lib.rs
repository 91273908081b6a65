pub mod envelope;
pub mod error;
pub mod event_handler;
pub mod position_projection;
pub mod publisher;
pub mod telemetry_service;
pub mod validate;
pub mod vehicle;
pub mod vehicle_state_store;

pub use envelope::*;
pub use error::{DomainError, DomainResult};
pub use event_handler::{HandleOutcome, TelemetryEventHandler};
pub use position_projection::PositionProjection;
pub use publisher::EventPublisher;
pub use telemetry_service::{PublishStatus, TelemetryService, TelemetryUpdate};
pub use validate::validate_struct;
pub use vehicle::*;
pub use vehicle_state_store::VehicleStateStore;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use event_handler::MockTelemetryEventHandler;
#[cfg(any(test, feature = "testing"))]
pub use publisher::MockEventPublisher;
