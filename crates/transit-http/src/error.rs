use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use transit_domain::DomainError;

/// Errors surfaced to HTTP callers
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Unprocessable(String),
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::VehicleNotFound(_) => Self::NotFound,
            DomainError::InvalidArgument(msg) => Self::Unprocessable(msg),
            DomainError::PublishFailure(e) => Self::Internal(format!("{e:#}")),
            DomainError::HandlerFailure(msg) => Self::Internal(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match self {
            Self::NotFound => "Bus not found".to_string(),
            Self::Unprocessable(msg) => msg,
            Self::Internal(msg) => {
                error!(error = %msg, "request failed");
                "Internal server error".to_string()
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
