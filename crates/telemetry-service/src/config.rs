use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use transit_http::HttpServerConfig;
use transit_nats::{BrokerConfig, QueueConfig};
use transit_tracing::TracingConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Broker
    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// Empty disables credential auth
    #[serde(default = "default_broker_credential")]
    pub broker_user: String,

    #[serde(default = "default_broker_credential")]
    pub broker_password: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Bound on connect + declare + publish + broker ack for one event
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    // HTTP
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // OpenTelemetry
    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    4222
}

fn default_broker_credential() -> String {
    "guest".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_queue_name() -> String {
    "telemetry.events".to_string()
}

fn default_publish_timeout_ms() -> u64 {
    2000
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8001
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "telemetry-service".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("TRANSIT"))
            .build()?
            .try_deserialize()
    }

    pub fn broker(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.broker_host.clone(),
            port: self.broker_port,
            user: self.broker_user.clone(),
            password: self.broker_password.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    pub fn queue(&self) -> QueueConfig {
        QueueConfig::new(self.queue_name.clone())
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn http(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.http_host.clone(),
            port: self.http_port,
            request_timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }

    pub fn tracing(&self) -> TracingConfig {
        TracingConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }
}
