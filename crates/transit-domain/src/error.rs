use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Vehicle not found: {0}")]
    VehicleNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Publish failure: {0:#}")]
    PublishFailure(anyhow::Error),

    #[error("Handler failure: {0}")]
    HandlerFailure(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
