mod config;
mod init;

pub use config::{TracerHandle, TracingConfig};
pub use init::{init_tracing, shutdown_tracing};
