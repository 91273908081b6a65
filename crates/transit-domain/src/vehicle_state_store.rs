use crate::error::{DomainError, DomainResult};
use crate::validate::validate_struct;
use crate::vehicle::{UpdateTelemetryInput, VehicleSnapshot};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory map of vehicle id to latest snapshot.
///
/// The registry is fixed at construction: ids are never added or removed
/// afterwards, only their snapshots are replaced.
pub struct VehicleStateStore {
    snapshots: RwLock<HashMap<String, VehicleSnapshot>>,
}

impl VehicleStateStore {
    pub fn new(seed: impl IntoIterator<Item = VehicleSnapshot>) -> Self {
        let snapshots = seed
            .into_iter()
            .map(|snapshot| (snapshot.vehicle_id.clone(), snapshot))
            .collect();

        Self {
            snapshots: RwLock::new(snapshots),
        }
    }

    pub async fn get(&self, vehicle_id: &str) -> DomainResult<VehicleSnapshot> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(vehicle_id)
            .cloned()
            .ok_or_else(|| DomainError::VehicleNotFound(vehicle_id.to_string()))
    }

    /// All registered vehicle ids, sorted
    pub async fn list(&self) -> Vec<String> {
        let snapshots = self.snapshots.read().await;
        let mut ids: Vec<String> = snapshots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Overwrite the snapshot for a registered vehicle.
    ///
    /// Lookup, validation and the write all happen under one write lock, so
    /// readers never observe a partially applied update. A rejected update
    /// leaves the previous snapshot untouched. Each accepted update bumps the
    /// vehicle's `sequence` by one.
    pub async fn replace(&self, input: UpdateTelemetryInput) -> DomainResult<VehicleSnapshot> {
        let mut snapshots = self.snapshots.write().await;

        let current = snapshots
            .get_mut(&input.vehicle_id)
            .ok_or_else(|| DomainError::VehicleNotFound(input.vehicle_id.clone()))?;

        validate_struct(&input)?;

        let occupancy = u8::try_from(input.occupancy).map_err(|_| {
            DomainError::InvalidArgument(format!("occupancy: {} out of range", input.occupancy))
        })?;

        // never move a vehicle's timestamp backwards, even if the wall clock does
        let now = Utc::now();
        let last_updated_utc = match current.last_updated_utc {
            Some(previous) if previous > now => previous,
            _ => now,
        };

        *current = VehicleSnapshot {
            vehicle_id: input.vehicle_id,
            latitude: input.latitude,
            longitude: input.longitude,
            occupancy,
            last_updated_utc: Some(last_updated_utc),
            sequence: current.sequence + 1,
        };

        debug!(
            vehicle_id = %current.vehicle_id,
            occupancy = current.occupancy,
            sequence = current.sequence,
            "Replaced vehicle snapshot"
        );

        Ok(current.clone())
    }
}
