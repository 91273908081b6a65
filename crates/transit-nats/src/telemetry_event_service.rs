use crate::consume::{ConsumeRequest, ConsumeResponse};
use crate::conversions::decode_envelope;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, warn};
use transit_domain::{HandleOutcome, TelemetryEventHandler};

/// Tower service decoding queue messages and handing them to the domain handler
///
/// Anything that keeps the handler from finishing turns into a Nak so the
/// broker redelivers the message later.
#[derive(Clone)]
pub struct TelemetryEventService {
    handler: Arc<dyn TelemetryEventHandler>,
}

impl TelemetryEventService {
    pub fn new(handler: Arc<dyn TelemetryEventHandler>) -> Self {
        Self { handler }
    }
}

impl Service<ConsumeRequest> for TelemetryEventService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let handler = Arc::clone(&self.handler);

        Box::pin(async move {
            let envelope = match decode_envelope(&req.payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(subject = %req.subject, error = %format!("{e:#}"), "undecodable message");
                    return Ok(ConsumeResponse::nak(format!("decode error: {e:#}")));
                }
            };

            match handler.handle(&envelope).await {
                Ok(HandleOutcome::Applied) => Ok(ConsumeResponse::ack()),
                Ok(HandleOutcome::Skipped) => {
                    debug!(
                        vehicle_id = %envelope.payload.vehicle_id,
                        redelivery = req.is_redelivery(),
                        "event already reflected, acknowledging"
                    );
                    Ok(ConsumeResponse::ack())
                }
                Err(e) => Ok(ConsumeResponse::nak(format!("handler error: {e}"))),
            }
        })
    }
}
