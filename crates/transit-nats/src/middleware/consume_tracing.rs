use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::consume::{ConsumeRequest, ConsumeResponse};
use crate::trace_context::set_parent_from_headers;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

/// Tower layer opening one span per consumed message, parented on the
/// publisher's trace when the message carries trace headers
#[derive(Clone)]
pub struct ConsumeTracingLayer {
    consumer_name: String,
}

impl ConsumeTracingLayer {
    pub fn new(consumer_name: impl Into<String>) -> Self {
        Self {
            consumer_name: consumer_name.into(),
        }
    }
}

impl<S> Layer<S> for ConsumeTracingLayer {
    type Service = ConsumeTracingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        ConsumeTracingService {
            inner: service,
            consumer_name: self.consumer_name.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ConsumeTracingService<S> {
    inner: S,
    consumer_name: String,
}

impl<S> Service<ConsumeRequest> for ConsumeTracingService<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse> + Clone + Send + 'static,
    S::Error: Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let span = info_span!(
            target: "nats",
            "nats_consume",
            otel.name = %format!("{} receive", req.subject),
            messaging.system = "nats",
            messaging.operation = "receive",
            messaging.destination.name = %req.subject,
            messaging.consumer.name = %self.consumer_name,
            messaging.message.delivery_count = req.delivery_count,
        );

        if let Some(headers) = &req.headers {
            let _entered = span.enter();
            set_parent_from_headers(headers);
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await }.instrument(span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_nats::HeaderMap;
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use tower::ServiceExt;

    #[derive(Clone)]
    struct AckAll;

    impl Service<ConsumeRequest> for AckAll {
        type Response = ConsumeResponse;
        type Error = anyhow::Error;
        type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: ConsumeRequest) -> Self::Future {
            Box::pin(async move { Ok(ConsumeResponse::Ack) })
        }
    }

    #[tokio::test]
    async fn test_request_with_trace_headers_is_processed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        );
        let request = ConsumeRequest::new(
            "telemetry.events".to_string(),
            Bytes::from("{}"),
            Some(headers),
            2,
        );

        let service = ConsumeTracingLayer::new("telemetry-worker").layer(AckAll);
        let response = service.oneshot(request).await.unwrap();

        assert!(response.is_ack());
    }
}
