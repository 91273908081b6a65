use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transit_domain::{UpdateTelemetryInput, VehicleSnapshot};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BusListResponse {
    pub buses: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BusResponse {
    pub bus_id: String,
    pub lat: f64,
    pub lon: f64,
    pub occupancy: u8,
    pub last_updated_utc: Option<DateTime<Utc>>,
}

impl From<VehicleSnapshot> for BusResponse {
    fn from(snapshot: VehicleSnapshot) -> Self {
        Self {
            bus_id: snapshot.vehicle_id,
            lat: snapshot.latitude,
            lon: snapshot.longitude,
            occupancy: snapshot.occupancy,
            last_updated_utc: snapshot.last_updated_utc,
        }
    }
}

/// Body of `POST /buses/{id}/update`
///
/// Occupancy is taken as a plain integer so out-of-range values reach domain
/// validation instead of failing deserialization.
#[derive(Debug, Deserialize)]
pub struct UpdateBusRequest {
    pub lat: f64,
    pub lon: f64,
    pub occupancy: i64,
}

impl UpdateBusRequest {
    pub fn into_input(self, bus_id: String) -> UpdateTelemetryInput {
        UpdateTelemetryInput {
            vehicle_id: bus_id,
            latitude: self.lat,
            longitude: self.lon,
            occupancy: self.occupancy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateBusResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub bus: BusResponse,
}
