mod dto;
mod error;
mod handlers;
mod server;

pub use dto::{BusListResponse, BusResponse, HealthResponse, UpdateBusRequest, UpdateBusResponse};
pub use error::ApiError;
pub use server::{build_router, run_http_server, HttpServerConfig};
