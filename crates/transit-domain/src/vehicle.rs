use chrono::{DateTime, Utc};
use garde::Validate;

/// Last known state of one vehicle. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSnapshot {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub occupancy: u8,
    /// `None` until the first update for this vehicle is recorded
    pub last_updated_utc: Option<DateTime<Utc>>,
    /// Number of accepted updates for this vehicle; 0 for a seeded snapshot
    pub sequence: u64,
}

impl VehicleSnapshot {
    /// Snapshot for a registered vehicle that has not reported yet
    pub fn seed(vehicle_id: impl Into<String>, latitude: f64, longitude: f64, occupancy: u8) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            latitude,
            longitude,
            occupancy,
            last_updated_utc: None,
            sequence: 0,
        }
    }
}

/// Input for replacing a vehicle snapshot
///
/// Occupancy is kept signed and wide so out-of-range requests reach
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Validate)]
pub struct UpdateTelemetryInput {
    #[garde(length(min = 1))]
    pub vehicle_id: String,
    #[garde(custom(finite), range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[garde(custom(finite), range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[garde(range(min = 0, max = 100))]
    pub occupancy: i64,
}

fn finite(value: &f64, _: &()) -> garde::Result {
    if value.is_finite() {
        Ok(())
    } else {
        Err(garde::Error::new("must be a finite number"))
    }
}

/// Registry the telemetry service starts with
pub fn default_fleet() -> Vec<VehicleSnapshot> {
    vec![
        VehicleSnapshot::seed("BUS-001", -0.1807, -78.4678, 12),
        VehicleSnapshot::seed("BUS-002", -0.1900, -78.4800, 5),
    ]
}
