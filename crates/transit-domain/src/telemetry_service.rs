use crate::envelope::EventEnvelope;
use crate::error::DomainResult;
use crate::publisher::EventPublisher;
use crate::vehicle::{UpdateTelemetryInput, VehicleSnapshot};
use crate::vehicle_state_store::VehicleStateStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether the change event for an update reached the queue
#[derive(Debug, Clone, PartialEq)]
pub enum PublishStatus {
    Published,
    Failed(String),
}

/// Result of an accepted update
///
/// The snapshot is committed regardless of `publish_status`: events are best
/// effort and a failed publish never rolls the store back.
#[derive(Debug, Clone)]
pub struct TelemetryUpdate {
    pub snapshot: VehicleSnapshot,
    pub publish_status: PublishStatus,
}

/// Domain service for vehicle telemetry
///
/// Flow for an update:
/// 1. Replace the snapshot in the state store (validation happens there)
/// 2. Wrap a copy of the new snapshot in an envelope
/// 3. Publish the envelope; failures are logged and reported, not raised
pub struct TelemetryService {
    store: Arc<VehicleStateStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl TelemetryService {
    pub fn new(store: Arc<VehicleStateStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    pub async fn get_vehicle(&self, vehicle_id: &str) -> DomainResult<VehicleSnapshot> {
        debug!(vehicle_id = %vehicle_id, "Getting vehicle snapshot");
        self.store.get(vehicle_id).await
    }

    pub async fn list_vehicles(&self) -> Vec<String> {
        self.store.list().await
    }

    pub async fn update_vehicle(&self, input: UpdateTelemetryInput) -> DomainResult<TelemetryUpdate> {
        debug!(
            vehicle_id = %input.vehicle_id,
            occupancy = input.occupancy,
            "Updating vehicle telemetry"
        );

        let snapshot = self.store.replace(input).await?;

        let envelope = EventEnvelope::telemetry_updated(snapshot.clone());
        let publish_status = match self.publisher.publish(&envelope).await {
            Ok(()) => {
                info!(
                    vehicle_id = %snapshot.vehicle_id,
                    event_type = %envelope.event_type,
                    "Published telemetry event"
                );
                PublishStatus::Published
            }
            Err(e) => {
                // state stays committed; there is no alerting beyond this line
                warn!(
                    vehicle_id = %snapshot.vehicle_id,
                    event_type = %envelope.event_type,
                    error = %e,
                    "Failed to publish telemetry event, snapshot kept"
                );
                PublishStatus::Failed(e.to_string())
            }
        };

        Ok(TelemetryUpdate {
            snapshot,
            publish_status,
        })
    }
}
