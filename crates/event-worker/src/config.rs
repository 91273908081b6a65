use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use transit_nats::{BrokerConfig, ConsumerSettings, QueueConfig, ReconnectPolicy};
use transit_tracing::TracingConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Broker
    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    #[serde(default = "default_broker_credential")]
    pub broker_user: String,

    #[serde(default = "default_broker_credential")]
    pub broker_password: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    // Consumer
    /// Durable consumer name; workers sharing it compete for messages
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    #[serde(default = "default_prefetch")]
    pub prefetch: usize,

    #[serde(default = "default_fetch_wait_secs")]
    pub fetch_wait_secs: u64,

    #[serde(default = "default_ack_wait_secs")]
    pub ack_wait_secs: u64,

    #[serde(default = "default_nak_delay_ms")]
    pub nak_delay_ms: u64,

    // Reconnect
    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

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

fn default_consumer_name() -> String {
    "telemetry-worker".to_string()
}

fn default_prefetch() -> usize {
    10
}

fn default_fetch_wait_secs() -> u64 {
    5
}

fn default_ack_wait_secs() -> u64 {
    30
}

fn default_nak_delay_ms() -> u64 {
    1000
}

fn default_max_connect_attempts() -> u32 {
    30
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "event-worker".to_string()
}

impl WorkerConfig {
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

    pub fn consumer(&self) -> ConsumerSettings {
        ConsumerSettings {
            consumer_name: self.consumer_name.clone(),
            prefetch: self.prefetch,
            fetch_wait: Duration::from_secs(self.fetch_wait_secs),
            ack_wait: Duration::from_secs(self.ack_wait_secs),
            nak_delay: Duration::from_millis(self.nak_delay_ms),
        }
    }

    pub fn reconnect(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_connect_attempts,
            delay: Duration::from_millis(self.reconnect_delay_ms),
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
