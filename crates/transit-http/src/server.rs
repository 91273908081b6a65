use crate::handlers::{get_bus, health, list_buses, update_bus};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use transit_domain::TelemetryService;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub fn build_router(service: Arc<TelemetryService>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/buses", get(list_buses))
        .route("/buses/:id", get(get_bus))
        .route("/buses/:id/update", post(update_bus))
        .with_state(service)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Run the HTTP server until the token is cancelled
pub async fn run_http_server(
    config: HttpServerConfig,
    service: Arc<TelemetryService>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Starting HTTP server on {}", addr);

    let app = build_router(service, config.request_timeout);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        cancellation_token.cancelled().await;
        info!("HTTP server shutdown signal received");
    });

    match server.await {
        Ok(()) => {
            info!("HTTP server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("HTTP server error: {}", e);
            Err(e.into())
        }
    }
}
