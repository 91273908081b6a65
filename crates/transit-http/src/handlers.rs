use crate::dto::{BusListResponse, BusResponse, HealthResponse, UpdateBusRequest, UpdateBusResponse};
use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use transit_domain::{PublishStatus, TelemetryService};

pub(crate) const SERVICE_NAME: &str = "telemetry-service";

#[instrument(name = "health")]
pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
    })
}

#[instrument(skip(service))]
pub(crate) async fn list_buses(State(service): State<Arc<TelemetryService>>) -> Json<BusListResponse> {
    Json(BusListResponse {
        buses: service.list_vehicles().await,
    })
}

#[instrument(skip(service))]
pub(crate) async fn get_bus(
    State(service): State<Arc<TelemetryService>>,
    Path(bus_id): Path<String>,
) -> Result<Json<BusResponse>, ApiError> {
    debug!(bus_id = %bus_id, "Received GetBus request");

    let snapshot = service.get_vehicle(&bus_id).await?;
    Ok(Json(snapshot.into()))
}

#[instrument(skip(service, payload))]
pub(crate) async fn update_bus(
    State(service): State<Arc<TelemetryService>>,
    Path(bus_id): Path<String>,
    payload: Result<Json<UpdateBusRequest>, JsonRejection>,
) -> Result<Json<UpdateBusResponse>, ApiError> {
    let Json(request) = payload?;

    let update = service.update_vehicle(request.into_input(bus_id)).await?;

    info!(
        bus_id = %update.snapshot.vehicle_id,
        published = matches!(update.publish_status, PublishStatus::Published),
        "Bus telemetry updated"
    );

    Ok(Json(UpdateBusResponse {
        ok: true,
        bus: update.snapshot.into(),
    }))
}
