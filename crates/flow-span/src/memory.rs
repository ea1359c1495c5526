//! In-memory tracing backend.
//!
//! Keeps every span it starts as an `ExecutionSpan` record. Used by tests
//! and by local runs that want to inspect the span tree after a flow.

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::handle::{SpanHandle, Tracer};
use crate::span::{ExecutionSpan, SpanEnd, SpanKind, SpanRequest};
use crate::tree::SpanTree;

/// Tracer that stores span records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTracer {
    spans: Arc<Mutex<Vec<ExecutionSpan>>>,
}

impl MemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record started so far, in start order.
    pub fn snapshot(&self) -> Vec<ExecutionSpan> {
        lock(&self.spans).clone()
    }

    pub fn find(&self, span_id: Uuid) -> Option<ExecutionSpan> {
        lock(&self.spans)
            .iter()
            .find(|s| s.span_id == span_id)
            .cloned()
    }

    pub fn spans_of_kind(&self, kind: SpanKind) -> Vec<ExecutionSpan> {
        lock(&self.spans)
            .iter()
            .filter(|s| s.span_kind == kind)
            .cloned()
            .collect()
    }

    /// Number of spans still running.
    pub fn active_count(&self) -> usize {
        lock(&self.spans).iter().filter(|s| !s.is_ended()).count()
    }

    /// Assemble the records of one trace into a parent/child tree.
    pub fn tree(&self, trace_id: Uuid) -> SpanTree {
        let records = lock(&self.spans)
            .iter()
            .filter(|s| s.trace_id == trace_id)
            .cloned()
            .collect();
        SpanTree::from_records(records)
    }

    pub fn clear(&self) {
        lock(&self.spans).clear();
    }
}

impl Tracer for MemoryTracer {
    fn start_span(&self, request: SpanRequest) -> Box<dyn SpanHandle> {
        let record = ExecutionSpan::start(request);
        let handle = MemorySpan {
            span_id: record.span_id,
            trace_id: record.trace_id,
            spans: Arc::clone(&self.spans),
        };
        lock(&self.spans).push(record);
        Box::new(handle)
    }
}

struct MemorySpan {
    span_id: Uuid,
    trace_id: Uuid,
    spans: Arc<Mutex<Vec<ExecutionSpan>>>,
}

impl MemorySpan {
    fn with_record<R>(&self, f: impl FnOnce(&mut ExecutionSpan) -> R) -> Option<R> {
        let mut spans = lock(&self.spans);
        spans.iter_mut().find(|s| s.span_id == self.span_id).map(f)
    }

    fn write_annotation(&self, key: &str, value: serde_json::Value) -> RecordWrite {
        match self.with_record(|record| {
            if record.is_ended() {
                false
            } else {
                record.annotate(key, value);
                true
            }
        }) {
            Some(true) => RecordWrite::Applied,
            Some(false) => RecordWrite::AlreadyEnded,
            None => RecordWrite::Missing,
        }
    }

    fn write_end(&self, end: SpanEnd) -> RecordWrite {
        match self.with_record(|record| record.finish(end)) {
            Some(true) => RecordWrite::Applied,
            Some(false) => RecordWrite::AlreadyEnded,
            None => RecordWrite::Missing,
        }
    }
}

/// Result of writing through a span handle to its stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordWrite {
    Applied,
    AlreadyEnded,
    /// The record was removed, e.g. by `MemoryTracer::clear`.
    Missing,
}

impl SpanHandle for MemorySpan {
    fn span_id(&self) -> Uuid {
        self.span_id
    }

    fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    fn annotate(&self, key: &str, value: serde_json::Value) {
        match self.write_annotation(key, value) {
            RecordWrite::Applied => {}
            RecordWrite::AlreadyEnded => {
                tracing::warn!(span_id = %self.span_id, key, "Ignoring annotation on ended span");
            }
            RecordWrite::Missing => {
                tracing::debug!(span_id = %self.span_id, key, "Dropping annotation for cleared span");
            }
        }
    }

    fn end(&self, end: SpanEnd) {
        match self.write_end(end) {
            RecordWrite::Applied => {}
            RecordWrite::AlreadyEnded => {
                tracing::warn!(span_id = %self.span_id, "Ignoring repeated end of span");
            }
            RecordWrite::Missing => {
                tracing::debug!(span_id = %self.span_id, "Dropping end of cleared span");
            }
        }
    }
}

fn lock(spans: &Mutex<Vec<ExecutionSpan>>) -> MutexGuard<'_, Vec<ExecutionSpan>> {
    spans.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TraceContext;
    use crate::span::{ObservationLevel, SpanStatus};

    #[test]
    fn test_start_and_end_records_span() {
        let tracer = MemoryTracer::new();
        let span = tracer.start_span(SpanRequest::new("flow", SpanKind::Flow, TraceContext::root()));

        assert_eq!(tracer.active_count(), 1);
        span.annotate("flow_id", serde_json::json!(1));
        span.end(SpanEnd::success());

        let record = tracer.find(span.span_id()).unwrap();
        assert_eq!(record.status, SpanStatus::Completed);
        assert_eq!(record.attribute("flow_id"), Some(&serde_json::json!(1)));
        assert_eq!(tracer.active_count(), 0);
    }

    #[test]
    fn test_double_end_keeps_first_outcome() {
        let tracer = MemoryTracer::new();
        let span = tracer.start_span(SpanRequest::new("task", SpanKind::Task, TraceContext::root()));

        span.end(SpanEnd::error("boom"));
        span.end(SpanEnd::success());

        let record = tracer.find(span.span_id()).unwrap();
        assert_eq!(record.status, SpanStatus::Failed);
        assert_eq!(record.level, ObservationLevel::Error);
        assert_eq!(record.status_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_annotation_after_end_is_ignored() {
        let tracer = MemoryTracer::new();
        let span = tracer.start_span(SpanRequest::new("task", SpanKind::Task, TraceContext::root()));
        span.end(SpanEnd::success());
        span.annotate("late", serde_json::json!(true));

        assert!(tracer.find(span.span_id()).unwrap().attribute("late").is_none());
    }

    #[test]
    fn test_cleared_record_is_not_reported_as_ended() {
        let tracer = MemoryTracer::new();
        let first = tracer.start_span(SpanRequest::new("task", SpanKind::Task, TraceContext::root()));
        let second = tracer.start_span(SpanRequest::new("task", SpanKind::Task, TraceContext::root()));
        let lookup = |span_id: Uuid| MemorySpan {
            spans: tracer.spans.clone(),
            span_id,
            trace_id: first.trace_id(),
        };

        first.end(SpanEnd::success());
        assert_eq!(lookup(first.span_id()).write_end(SpanEnd::success()), RecordWrite::AlreadyEnded);

        tracer.clear();
        assert_eq!(lookup(second.span_id()).write_end(SpanEnd::success()), RecordWrite::Missing);
        assert_eq!(
            lookup(second.span_id()).write_annotation("late", serde_json::json!(1)),
            RecordWrite::Missing
        );
        assert!(tracer.snapshot().is_empty());
    }

    #[test]
    fn test_tree_filters_by_trace() {
        let tracer = MemoryTracer::new();
        let root = tracer.start_span(SpanRequest::new("flow", SpanKind::Flow, TraceContext::root()));
        let child = tracer.start_span(SpanRequest::new(
            "task",
            SpanKind::Task,
            TraceContext::child_of(root.trace_id(), root.span_id()),
        ));
        let _other = tracer.start_span(SpanRequest::new("other", SpanKind::Flow, TraceContext::root()));
        child.end(SpanEnd::success());
        root.end(SpanEnd::success());

        let tree = tracer.tree(root.trace_id());
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.roots()[0].children.len(), 1);
        assert_eq!(tree.len(), 2);
        assert_eq!(tracer.spans_of_kind(SpanKind::Flow).len(), 2);
    }
}
