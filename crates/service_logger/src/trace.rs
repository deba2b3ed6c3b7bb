//! Extraction of distributed-tracing identifiers from an OpenTelemetry [`Context`].

use opentelemetry::{
    Context,
    trace::{SpanId, TraceContextExt, TraceId},
};

/// Trace and span IDs of the span active in a context, in lower-case hex.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct TraceIds {
    pub(crate) span_id: Option<String>,
    pub(crate) trace_id: Option<String>,
}

impl TraceIds {
    /// Invalid (all-zero) IDs are treated as absent.
    pub(crate) fn from_context(cx: &Context) -> Self {
        let span = cx.span();
        let span_context = span.span_context();
        let span_id = span_context.span_id();
        let trace_id = span_context.trace_id();

        Self {
            span_id: (span_id != SpanId::INVALID).then(|| span_id.to_string()),
            trace_id: (trace_id != TraceId::INVALID).then(|| trace_id.to_string()),
        }
    }
}
