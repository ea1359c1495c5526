//! Span handle contract consumed by the controller.
//!
//! A tracing backend hands out one `SpanHandle` per unit of work. The
//! controller only opens, annotates and ends spans through these traits and
//! never talks to a backend client directly.

use uuid::Uuid;

use crate::span::{SpanEnd, SpanRequest};

/// Opaque handle to one active span.
///
/// Lifecycle: `Tracer::start_span` (NotStarted -> Active), any number of
/// `annotate` calls, one `end` (Active -> Ended). Backends must treat a
/// second `end` as a no-op.
pub trait SpanHandle: Send + Sync {
    fn span_id(&self) -> Uuid;

    fn trace_id(&self) -> Uuid;

    /// Attach an attribute while the span is active.
    fn annotate(&self, key: &str, value: serde_json::Value);

    /// Close the span with the given status and level.
    fn end(&self, end: SpanEnd);
}

/// Factory for spans, supplied once with the collaborator bundle.
pub trait Tracer: Send + Sync {
    fn start_span(&self, request: SpanRequest) -> Box<dyn SpanHandle>;
}

/// Tracer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

struct NoopSpan {
    span_id: Uuid,
    trace_id: Uuid,
}

impl SpanHandle for NoopSpan {
    fn span_id(&self) -> Uuid {
        self.span_id
    }

    fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    fn annotate(&self, _key: &str, _value: serde_json::Value) {}

    fn end(&self, _end: SpanEnd) {}
}

impl Tracer for NoopTracer {
    fn start_span(&self, request: SpanRequest) -> Box<dyn SpanHandle> {
        Box::new(NoopSpan {
            span_id: Uuid::new_v4(),
            trace_id: request.trace.trace_id,
        })
    }
}
