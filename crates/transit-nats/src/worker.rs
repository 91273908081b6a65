use crate::config::{ConsumerSettings, QueueConfig, ReconnectPolicy};
use crate::consume::{ConsumeRequest, ConsumeResponse};
use crate::traits::{BrokerConnector, BrokerSession, Delivery, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::consumer::{pull, AckPolicy};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("broker unreachable after {attempts} attempts: {last_error:#}")]
    ConnectFailure {
        attempts: u32,
        last_error: anyhow::Error,
    },
}

enum WorkerState {
    /// No connection; `failed_attempts` counts consecutive failures so far
    Disconnected { failed_attempts: u32 },
    Connected {
        session: Box<dyn BrokerSession>,
        attempt: u32,
    },
    Consuming {
        session: Box<dyn BrokerSession>,
        consumer: Box<dyn PullConsumer>,
    },
    Fatal(WorkerError),
    Stopped,
}

/// Long-running consumer of the durable queue.
///
/// Connects with a fixed delay between attempts, gives up after
/// `ReconnectPolicy::max_attempts` consecutive failures, and pulls messages
/// one batch at a time through a tower service. Each message is acked only
/// after the service says so; everything else is left for redelivery.
/// A broken connection while consuming sends the worker back to reconnecting
/// with a fresh attempt budget.
pub struct EventWorker<S> {
    connector: Arc<dyn BrokerConnector>,
    queue: QueueConfig,
    settings: ConsumerSettings,
    policy: ReconnectPolicy,
    service: S,
}

impl<S> EventWorker<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        queue: QueueConfig,
        settings: ConsumerSettings,
        policy: ReconnectPolicy,
        service: S,
    ) -> Self {
        Self {
            connector,
            queue,
            settings,
            policy,
            service,
        }
    }

    /// Run until cancelled or until the broker cannot be reached
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        info!(
            queue = %self.queue.name,
            consumer = %self.settings.consumer_name,
            prefetch = self.settings.prefetch,
            "starting event worker"
        );

        let mut state = WorkerState::Disconnected { failed_attempts: 0 };

        loop {
            if ctx.is_cancelled() {
                state = self.stop(state).await;
            }

            state = match state {
                WorkerState::Disconnected { failed_attempts } => {
                    self.connect(failed_attempts + 1, &ctx).await
                }
                WorkerState::Connected { session, attempt } => {
                    self.bind(session, attempt, &ctx).await
                }
                WorkerState::Consuming { session, consumer } => {
                    self.consume_batch(session, consumer, &ctx).await
                }
                WorkerState::Fatal(e) => {
                    error!(error = %e, "event worker giving up");
                    return Err(e.into());
                }
                WorkerState::Stopped => break,
            };
        }

        info!(consumer = %self.settings.consumer_name, "event worker stopped");
        Ok(())
    }

    async fn connect(&self, attempt: u32, ctx: &CancellationToken) -> WorkerState {
        debug!(
            attempt,
            max_attempts = self.policy.max_attempts,
            "connecting to broker"
        );

        let connected = tokio::select! {
            _ = ctx.cancelled() => return WorkerState::Stopped,
            result = self.connector.connect() => result,
        };

        match connected {
            Ok(session) => WorkerState::Connected { session, attempt },
            Err(e) => self.retry_or_fail(attempt, e, ctx).await,
        }
    }

    /// Declare the queue and bind the durable consumer on a fresh session
    async fn bind(
        &self,
        session: Box<dyn BrokerSession>,
        attempt: u32,
        ctx: &CancellationToken,
    ) -> WorkerState {
        match self.create_consumer(session.as_ref()).await {
            Ok(consumer) => {
                info!(
                    queue = %self.queue.name,
                    consumer = %self.settings.consumer_name,
                    attempt,
                    "consuming from queue"
                );
                WorkerState::Consuming { session, consumer }
            }
            Err(e) => {
                close_quietly(session.as_ref()).await;
                self.retry_or_fail(attempt, e, ctx).await
            }
        }
    }

    async fn create_consumer(&self, session: &dyn BrokerSession) -> Result<Box<dyn PullConsumer>> {
        session
            .ensure_queue(&self.queue)
            .await
            .context("failed to declare queue")?;

        let config = pull::Config {
            name: Some(self.settings.consumer_name.clone()),
            durable_name: Some(self.settings.consumer_name.clone()),
            filter_subject: self.queue.subject().to_string(),
            ack_policy: AckPolicy::Explicit,
            ack_wait: self.settings.ack_wait,
            max_ack_pending: self.settings.prefetch as i64,
            ..Default::default()
        };

        session
            .create_consumer(config, &self.queue.stream_name())
            .await
            .context("failed to create consumer")
    }

    async fn retry_or_fail(
        &self,
        attempt: u32,
        e: anyhow::Error,
        ctx: &CancellationToken,
    ) -> WorkerState {
        if attempt >= self.policy.max_attempts {
            return WorkerState::Fatal(WorkerError::ConnectFailure {
                attempts: attempt,
                last_error: e,
            });
        }

        warn!(
            attempt,
            max_attempts = self.policy.max_attempts,
            retry_in_ms = self.policy.delay.as_millis(),
            error = %format!("{e:#}"),
            "broker not reachable, retrying"
        );

        tokio::select! {
            _ = ctx.cancelled() => WorkerState::Stopped,
            _ = tokio::time::sleep(self.policy.delay) => WorkerState::Disconnected { failed_attempts: attempt },
        }
    }

    async fn consume_batch(
        &mut self,
        session: Box<dyn BrokerSession>,
        consumer: Box<dyn PullConsumer>,
        ctx: &CancellationToken,
    ) -> WorkerState {
        let fetched = tokio::select! {
            _ = ctx.cancelled() => return WorkerState::Consuming { session, consumer },
            result = consumer.fetch_messages(self.settings.prefetch, self.settings.fetch_wait) => result,
        };

        let batch = match fetched {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "lost broker connection, reconnecting");
                close_quietly(session.as_ref()).await;
                return WorkerState::Disconnected { failed_attempts: 0 };
            }
        };

        if !batch.is_empty() {
            debug!(message_count = batch.len(), "received message batch");
        }

        for delivery in batch {
            // anything left in the batch is redelivered after the ack wait
            if ctx.is_cancelled() {
                break;
            }
            self.process(delivery.as_ref()).await;
        }

        WorkerState::Consuming { session, consumer }
    }

    async fn process(&mut self, delivery: &dyn Delivery) {
        let subject = delivery.subject();
        let request = ConsumeRequest::new(
            subject.clone(),
            delivery.payload(),
            delivery.headers(),
            delivery.delivery_count(),
        );

        let result = match self.service.ready().await {
            Ok(service) => service.call(request).await,
            Err(e) => Err(e),
        };

        let response = result.unwrap_or_else(|e| {
            error!(subject = %subject, error = %e, "service error processing message");
            ConsumeResponse::nak(e.to_string())
        });

        match response {
            ConsumeResponse::Ack => {
                if let Err(e) = delivery.ack().await {
                    error!(subject = %subject, error = %e, "failed to acknowledge message");
                }
            }
            ConsumeResponse::Nak(reason) => {
                warn!(
                    subject = %subject,
                    reason = reason.as_deref().unwrap_or("unspecified"),
                    "rejecting message for redelivery"
                );
                if let Err(e) = delivery.nak(Some(self.settings.nak_delay)).await {
                    error!(subject = %subject, error = %e, "failed to reject message");
                }
            }
        }
    }

    async fn stop(&self, state: WorkerState) -> WorkerState {
        match state {
            WorkerState::Connected { session, .. } | WorkerState::Consuming { session, .. } => {
                info!("received shutdown signal, closing broker connection");
                close_quietly(session.as_ref()).await;
                WorkerState::Stopped
            }
            WorkerState::Fatal(e) => WorkerState::Fatal(e),
            _ => WorkerState::Stopped,
        }
    }
}

async fn close_quietly(session: &dyn BrokerSession) {
    if let Err(e) = session.close().await {
        debug!(error = %e, "failed to close broker connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockBrokerConnector, MockBrokerSession, MockDelivery, MockPullConsumer};
    use anyhow::anyhow;
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            delay: Duration::from_millis(100),
        }
    }

    fn settings() -> ConsumerSettings {
        ConsumerSettings {
            nak_delay: Duration::from_millis(250),
            ..Default::default()
        }
    }

    fn worker<S>(connector: MockBrokerConnector, max_attempts: u32, service: S) -> EventWorker<S>
    where
        S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        EventWorker::new(
            Arc::new(connector),
            QueueConfig::default(),
            settings(),
            policy(max_attempts),
            service,
        )
    }

    /// Service answering every message the same way
    #[derive(Clone)]
    struct Responding(ConsumeResponse);

    impl Service<ConsumeRequest> for Responding {
        type Response = ConsumeResponse;
        type Error = anyhow::Error;
        type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: ConsumeRequest) -> Self::Future {
            let response = self.0.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    fn responding(response: ConsumeResponse) -> Responding {
        Responding(response)
    }

    /// Session that binds successfully and serves exactly one batch
    fn session_serving(delivery: MockDelivery) -> MockBrokerSession {
        let mut consumer = MockPullConsumer::new();
        consumer
            .expect_fetch_messages()
            .withf(|max: &usize, _expires: &Duration| *max == 10)
            .times(1)
            .return_once(move |_, _| Ok(vec![Box::new(delivery) as Box<dyn Delivery>]));

        let mut session = MockBrokerSession::new();
        session.expect_ensure_queue().times(1).returning(|_| Ok(()));
        session
            .expect_create_consumer()
            .withf(|config: &pull::Config, stream: &str| {
                config.durable_name.as_deref() == Some("telemetry-worker")
                    && config.filter_subject == "telemetry.events"
                    && matches!(config.ack_policy, AckPolicy::Explicit)
                    && config.max_ack_pending == 10
                    && stream == "telemetry_events"
            })
            .times(1)
            .return_once(move |_, _| Ok(Box::new(consumer) as Box<dyn PullConsumer>));
        session.expect_close().times(1).returning(|| Ok(()));
        session
    }

    fn delivery() -> MockDelivery {
        let mut delivery = MockDelivery::new();
        delivery
            .expect_subject()
            .returning(|| "telemetry.events".to_string());
        delivery.expect_payload().returning(|| Bytes::from_static(b"{}"));
        delivery.expect_headers().returning(|| None);
        delivery.expect_delivery_count().returning(|| 1);
        delivery
    }

    fn connector_once(session: MockBrokerSession) -> MockBrokerConnector {
        let mut connector = MockBrokerConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move || Ok(Box::new(session) as Box<dyn BrokerSession>));
        connector
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let mut connector = MockBrokerConnector::new();
        connector
            .expect_connect()
            .times(3)
            .returning(|| Err(anyhow!("connection refused")));

        let result = worker(connector, 3, responding(ConsumeResponse::Ack))
            .run(CancellationToken::new())
            .await;

        let err = result.unwrap_err();
        match err.downcast_ref::<WorkerError>() {
            Some(WorkerError::ConnectFailure { attempts, .. }) => assert_eq!(*attempts, 3),
            None => panic!("Expected WorkerError, got {:?}", err),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_declare_failure_counts_as_attempt() {
        let mut connector = MockBrokerConnector::new();
        connector.expect_connect().times(2).returning(|| {
            let mut session = MockBrokerSession::new();
            session
                .expect_ensure_queue()
                .times(1)
                .returning(|_| Err(anyhow!("stream unavailable")));
            session.expect_close().returning(|| Ok(()));
            Ok(Box::new(session) as Box<dyn BrokerSession>)
        });

        let result = worker(connector, 2, responding(ConsumeResponse::Ack))
            .run(CancellationToken::new())
            .await;

        assert!(result.unwrap_err().to_string().contains("after 2 attempts"));
    }

    #[tokio::test]
    async fn test_acks_when_service_acks() {
        let ctx = CancellationToken::new();
        let stop = ctx.clone();

        let mut delivery = delivery();
        delivery.expect_ack().times(1).returning(move || {
            stop.cancel();
            Ok(())
        });
        delivery.expect_nak().never();

        let result = worker(
            connector_once(session_serving(delivery)),
            3,
            responding(ConsumeResponse::Ack),
        )
        .run(ctx)
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_naks_with_delay_when_service_rejects() {
        let ctx = CancellationToken::new();
        let stop = ctx.clone();

        let mut delivery = delivery();
        delivery.expect_ack().never();
        delivery
            .expect_nak()
            .withf(|delay: &Option<Duration>| *delay == Some(Duration::from_millis(250)))
            .times(1)
            .returning(move |_| {
                stop.cancel();
                Ok(())
            });

        let result = worker(
            connector_once(session_serving(delivery)),
            3,
            responding(ConsumeResponse::nak("handler error")),
        )
        .run(ctx)
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_service_error_is_nacked() {
        let ctx = CancellationToken::new();
        let stop = ctx.clone();

        let mut delivery = delivery();
        delivery.expect_ack().never();
        delivery.expect_nak().times(1).returning(move |_| {
            stop.cancel();
            Ok(())
        });

        let failing = tower::service_fn(|_req: ConsumeRequest| async {
            Err::<ConsumeResponse, _>(anyhow!("service exploded"))
        });

        let result = worker(connector_once(session_serving(delivery)), 3, failing)
            .run(ctx)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_reconnects() {
        let ctx = CancellationToken::new();
        let stop = ctx.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut connector = MockBrokerConnector::new();
        connector.expect_connect().times(2).returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                stop.cancel();
                return Err(anyhow!("connection refused"));
            }

            let mut consumer = MockPullConsumer::new();
            consumer
                .expect_fetch_messages()
                .times(1)
                .returning(|_, _| Err(anyhow!("connection reset")));

            let mut session = MockBrokerSession::new();
            session.expect_ensure_queue().returning(|_| Ok(()));
            session
                .expect_create_consumer()
                .return_once(move |_, _| Ok(Box::new(consumer) as Box<dyn PullConsumer>));
            session.expect_close().times(1).returning(|| Ok(()));
            Ok(Box::new(session) as Box<dyn BrokerSession>)
        });

        let result = worker(connector, 5, responding(ConsumeResponse::Ack))
            .run(ctx)
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_connects() {
        let mut connector = MockBrokerConnector::new();
        connector.expect_connect().never();

        let ctx = CancellationToken::new();
        ctx.cancel();

        let result = worker(connector, 3, responding(ConsumeResponse::Ack))
            .run(ctx)
            .await;

        assert!(result.is_ok());
    }
}
