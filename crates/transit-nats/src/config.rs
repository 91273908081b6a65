use std::time::Duration;

/// Where and how to reach the broker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Empty user disables credential auth
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl BrokerConfig {
    pub fn url(&self) -> String {
        format!("nats://{}:{}", self.host, self.port)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4222,
            user: "guest".to_string(),
            password: "guest".to_string(),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

/// A named durable queue.
///
/// Events are published on a subject equal to the queue name and stored in a
/// file-backed work-queue stream derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: String,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Subject messages are routed on
    pub fn subject(&self) -> &str {
        &self.name
    }

    /// JetStream stream names may not contain '.', '*', '>' or whitespace
    pub fn stream_name(&self) -> String {
        self.name
            .chars()
            .map(|c| match c {
                '.' | '*' | '>' => '_',
                c if c.is_whitespace() => '_',
                c => c,
            })
            .collect()
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new("telemetry.events")
    }
}

/// Durable pull consumer settings for the worker
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Durable name shared by competing workers
    pub consumer_name: String,
    /// Max unacknowledged messages held by this consumer
    pub prefetch: usize,
    /// How long one fetch waits for messages
    pub fetch_wait: Duration,
    /// Broker redelivers a dispatched message not acked within this window
    pub ack_wait: Duration,
    /// Redelivery delay requested when a message is rejected
    pub nak_delay: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            consumer_name: "telemetry-worker".to_string(),
            prefetch: 10,
            fetch_wait: Duration::from_secs(5),
            ack_wait: Duration::from_secs(30),
            nak_delay: Duration::from_secs(1),
        }
    }
}

/// Fixed-delay, bounded connection retry
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_name_replaces_dots() {
        let queue = QueueConfig::default();
        assert_eq!(queue.subject(), "telemetry.events");
        assert_eq!(queue.stream_name(), "telemetry_events");
    }

    #[test]
    fn test_stream_name_replaces_wildcards_and_spaces() {
        let queue = QueueConfig::new("fleet.*.pos >x y");
        assert_eq!(queue.stream_name(), "fleet___pos__x_y");
    }

    #[test]
    fn test_broker_url() {
        let config = BrokerConfig {
            host: "nats".to_string(),
            port: 4223,
            ..Default::default()
        };
        assert_eq!(config.url(), "nats://nats:4223");
    }
}
