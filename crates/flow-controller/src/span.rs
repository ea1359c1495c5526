//! Scoped span lifecycle
//!
//! Each flow, task and subtask execution owns exactly one `ScopedSpan`:
//! `NotStarted -> Active` when opened, `Active -> Ended(Success | Error)`
//! exactly once before the owning function returns. A repeated end is a
//! logged no-op. A guard dropped while still active (an aborted or
//! cancelled future) ends its span with an error status, so no span is
//! left running past its owner.

use std::sync::atomic::{AtomicU8, Ordering};

use flow_span::{ObservationLevel, SpanEnd, SpanHandle, SpanKind, SpanRequest, TraceContext};
use uuid::Uuid;

use crate::context::ExecutionScope;

/// Status recorded on a span whose guard was dropped while active.
pub const DROPPED_SPAN_STATUS: &str = "span dropped before completion";

const ACTIVE: u8 = 0;
const ENDED_SUCCESS: u8 = 1;
const ENDED_ERROR: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOutcome {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    Active,
    Ended(SpanOutcome),
}

/// Guard owning one span for the duration of a unit of work.
pub struct ScopedSpan {
    handle: Box<dyn SpanHandle>,
    name: String,
    kind: SpanKind,
    state: AtomicU8,
}

impl ScopedSpan {
    /// Open a root span for the scope's trace.
    pub fn root<S: ExecutionScope + ?Sized>(scope: &S, name: impl Into<String>) -> Self {
        let trace = TraceContext {
            trace_id: scope.trace_id(),
            parent_span_id: None,
        };
        Self::open(scope, trace, name.into())
    }

    /// Open a span nested under this one.
    pub fn child<S: ExecutionScope + ?Sized>(&self, scope: &S, name: impl Into<String>) -> Self {
        let trace = TraceContext::child_of(self.handle.trace_id(), self.handle.span_id());
        Self::open(scope, trace, name.into())
    }

    fn open<S: ExecutionScope + ?Sized>(scope: &S, trace: TraceContext, name: String) -> Self {
        let identity = scope.identity();
        let mut request = SpanRequest::new(name.clone(), identity.level, trace);
        request.attributes = identity.span_attributes();

        let handle = scope.collaborators().tracer().start_span(request);
        tracing::debug!(
            span_id = %handle.span_id(),
            level = identity.level.as_str(),
            flow_id = identity.flow_id,
            task_id = ?identity.task_id,
            subtask_id = ?identity.subtask_id,
            "Span started"
        );

        Self {
            handle,
            name,
            kind: identity.level,
            state: AtomicU8::new(ACTIVE),
        }
    }

    pub fn span_id(&self) -> Uuid {
        self.handle.span_id()
    }

    pub fn trace_id(&self) -> Uuid {
        self.handle.trace_id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    pub fn state(&self) -> SpanState {
        match self.state.load(Ordering::Acquire) {
            ACTIVE => SpanState::Active,
            ENDED_SUCCESS => SpanState::Ended(SpanOutcome::Success),
            _ => SpanState::Ended(SpanOutcome::Error),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SpanState::Active
    }

    /// Attach an attribute; ignored once the span has ended.
    pub fn annotate(&self, key: &str, value: serde_json::Value) {
        if self.is_active() {
            self.handle.annotate(key, value);
        }
    }

    pub fn end_success(&self) -> bool {
        self.end(SpanEnd::success())
    }

    pub fn end_success_with(&self, output: serde_json::Value) -> bool {
        self.end(SpanEnd::success().with_output(output))
    }

    pub fn end_error(&self, status: impl Into<String>) -> bool {
        self.end(SpanEnd::error(status))
    }

    /// End the span once. Returns `false` (and logs) if it had already ended.
    pub fn end(&self, end: SpanEnd) -> bool {
        let target = if end.level == ObservationLevel::Error {
            ENDED_ERROR
        } else {
            ENDED_SUCCESS
        };

        if self
            .state
            .compare_exchange(ACTIVE, target, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(
                span_id = %self.handle.span_id(),
                span = %self.name,
                state = ?self.state(),
                "Span already ended; ignoring repeated end"
            );
            return false;
        }

        self.handle.end(end);
        true
    }
}

impl Drop for ScopedSpan {
    fn drop(&mut self) {
        if self.is_active() {
            tracing::warn!(
                span_id = %self.handle.span_id(),
                span = %self.name,
                "Span dropped while active"
            );
            self.end(SpanEnd::error(DROPPED_SPAN_STATUS));
        }
    }
}

impl std::fmt::Debug for ScopedSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSpan")
            .field("span_id", &self.handle.span_id())
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}
