use crate::envelope::{EventEnvelope, BUS_TELEMETRY_UPDATED};
use crate::error::{DomainError, DomainResult};
use crate::event_handler::{HandleOutcome, TelemetryEventHandler};
use crate::vehicle::VehicleSnapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Worker-side view of the latest known position of each vehicle
///
/// Events for a vehicle are ordered by the store's per-vehicle `sequence`.
/// An event is applied only when it is newer than what the projection already
/// holds, so redelivered and reordered events are acknowledged without
/// changing state. Events from publishers that predate `sequence` carry 0
/// and fall back to `last_updated_utc`.
pub struct PositionProjection {
    positions: RwLock<HashMap<String, VehicleSnapshot>>,
}

impl PositionProjection {
    pub fn new() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn latest(&self, vehicle_id: &str) -> Option<VehicleSnapshot> {
        let positions = self.positions.read().await;
        positions.get(vehicle_id).cloned()
    }

    pub async fn count(&self) -> usize {
        let positions = self.positions.read().await;
        positions.len()
    }
}

impl Default for PositionProjection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryEventHandler for PositionProjection {
    async fn handle(&self, envelope: &EventEnvelope) -> DomainResult<HandleOutcome> {
        if envelope.event_type != BUS_TELEMETRY_UPDATED {
            return Err(DomainError::HandlerFailure(format!(
                "unsupported event type: {}",
                envelope.event_type
            )));
        }

        let snapshot = &envelope.payload;
        let updated_at = snapshot.last_updated_utc.ok_or_else(|| {
            DomainError::HandlerFailure(format!(
                "event for {} has no last_updated_utc",
                snapshot.vehicle_id
            ))
        })?;

        let mut positions = self.positions.write().await;

        if let Some(known) = positions.get(&snapshot.vehicle_id) {
            if !supersedes(snapshot, known) {
                debug!(
                    vehicle_id = %snapshot.vehicle_id,
                    sequence = snapshot.sequence,
                    known_sequence = known.sequence,
                    last_updated_utc = %updated_at,
                    "Skipping duplicate or stale telemetry event"
                );
                return Ok(HandleOutcome::Skipped);
            }
        }

        positions.insert(snapshot.vehicle_id.clone(), snapshot.clone());

        info!(
            vehicle_id = %snapshot.vehicle_id,
            lat = snapshot.latitude,
            lon = snapshot.longitude,
            occupancy = snapshot.occupancy,
            sequence = snapshot.sequence,
            last_updated_utc = %updated_at,
            published_at = %envelope.timestamp_utc,
            "Applied telemetry event"
        );

        Ok(HandleOutcome::Applied)
    }
}

/// Whether `incoming` should replace `known`
fn supersedes(incoming: &VehicleSnapshot, known: &VehicleSnapshot) -> bool {
    if incoming.sequence != known.sequence {
        return incoming.sequence > known.sequence;
    }
    if incoming.sequence > 0 {
        return false;
    }
    // unsequenced: a tied timestamp with a different reading is still an update
    match (incoming.last_updated_utc, known.last_updated_utc) {
        (Some(incoming_at), Some(known_at)) if incoming_at == known_at => incoming != known,
        (Some(incoming_at), Some(known_at)) => incoming_at > known_at,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}
