use crate::vehicle::VehicleSnapshot;
use chrono::{DateTime, Utc};

/// Event type emitted for every accepted telemetry update
pub const BUS_TELEMETRY_UPDATED: &str = "bus_telemetry_updated";

/// Durable unit of work carried on the queue
///
/// The payload is an owned copy of the snapshot taken at mutation time.
/// `timestamp_utc` is stamped when the envelope is built for publishing and is
/// unrelated to `payload.last_updated_utc`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub event_type: String,
    pub timestamp_utc: DateTime<Utc>,
    pub payload: VehicleSnapshot,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, payload: VehicleSnapshot) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp_utc: Utc::now(),
            payload,
        }
    }

    pub fn telemetry_updated(payload: VehicleSnapshot) -> Self {
        Self::new(BUS_TELEMETRY_UPDATED, payload)
    }
}
