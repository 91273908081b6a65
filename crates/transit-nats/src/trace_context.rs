//! Carries the publisher's trace across the queue in message headers, so the
//! worker's per-message span joins the HTTP request that produced the event.

use async_nats::HeaderMap;
use opentelemetry::{
    global,
    propagation::{Extractor, Injector, TextMapPropagator},
    Context,
};
use tracing_opentelemetry::OpenTelemetrySpanExt;

const TRACEPARENT: &str = "traceparent";
const TRACESTATE: &str = "tracestate";

struct OutgoingHeaders<'a>(&'a mut HeaderMap);

impl Injector for OutgoingHeaders<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key, value.as_str());
    }
}

struct IncomingHeaders<'a>(&'a HeaderMap);

impl Extractor for IncomingHeaders<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        [TRACEPARENT, TRACESTATE]
            .into_iter()
            .filter(|key| self.0.get(*key).is_some())
            .collect()
    }
}

fn inject_with(propagator: &dyn TextMapPropagator, cx: &Context, headers: &mut HeaderMap) {
    propagator.inject_context(cx, &mut OutgoingHeaders(headers));
}

fn extract_with(propagator: &dyn TextMapPropagator, headers: &HeaderMap) -> Context {
    propagator.extract(&IncomingHeaders(headers))
}

/// Stamp a telemetry event with the current span's trace.
///
/// Leaves the headers untouched when span export is disabled, since no
/// propagator is installed then.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let cx = tracing::Span::current().context();
    global::get_text_map_propagator(|propagator| inject_with(propagator, &cx, headers));
}

pub fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| extract_with(propagator, headers))
}

/// Parent the current consume span on the trace found in `headers`
pub fn set_parent_from_headers(headers: &HeaderMap) {
    tracing::Span::current().set_parent(extract_trace_context(headers));
}
