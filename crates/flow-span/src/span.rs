//! Core execution span types for flow instrumentation.
//!
//! Defines `ExecutionSpan`, `SpanKind`, `SpanStatus` and the end options
//! used to build hierarchical execution graphs: Flow -> Task -> Subtask.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::context::TraceContext;

/// Status of an execution span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Running,
    Completed,
    Failed,
}

/// Level of the unit of work a span covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Flow,
    Task,
    Subtask,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Flow => "flow",
            SpanKind::Task => "task",
            SpanKind::Subtask => "subtask",
        }
    }
}

/// Severity attached to a span when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObservationLevel {
    Debug,
    #[default]
    Default,
    Warning,
    Error,
}

impl ObservationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationLevel::Debug => "debug",
            ObservationLevel::Default => "default",
            ObservationLevel::Warning => "warning",
            ObservationLevel::Error => "error",
        }
    }
}

/// Options applied when a span ends.
///
/// A span ended with level `Error` is recorded as `Failed`; any other
/// level records it as `Completed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanEnd {
    pub status: Option<String>,
    pub level: ObservationLevel,
    pub output: Option<serde_json::Value>,
}

impl SpanEnd {
    /// End options for a unit of work that completed normally.
    pub fn success() -> Self {
        Self::default()
    }

    /// End options for a failed unit of work.
    pub fn error(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            level: ObservationLevel::Error,
            output: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_level(mut self, level: ObservationLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == ObservationLevel::Error
    }
}

/// Everything a tracer needs to open a span.
#[derive(Debug, Clone)]
pub struct SpanRequest {
    pub name: String,
    pub kind: SpanKind,
    pub trace: TraceContext,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl SpanRequest {
    pub fn new(name: impl Into<String>, kind: SpanKind, trace: TraceContext) -> Self {
        Self {
            name: name.into(),
            kind,
            trace,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// A single execution span record.
///
/// Spans form a tree: Flow -> Task(s) -> Subtask(s). Each record is
/// causally ordered via `parent_span_id` and JSON-serializable without loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSpan {
    pub span_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<Uuid>,
    pub trace_id: Uuid,
    pub span_kind: SpanKind,
    pub status: SpanStatus,
    pub level: ObservationLevel,
    pub name: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub attributes: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExecutionSpan>,
}

impl ExecutionSpan {
    /// Create a running span from a request.
    pub fn start(request: SpanRequest) -> Self {
        Self {
            span_id: Uuid::new_v4(),
            parent_span_id: request.trace.parent_span_id,
            trace_id: request.trace.trace_id,
            span_kind: request.kind,
            status: SpanStatus::Running,
            level: ObservationLevel::Default,
            name: request.name,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            attributes: request.attributes,
            status_message: None,
            output: None,
            children: Vec::new(),
        }
    }

    pub fn is_ended(&self) -> bool {
        self.status != SpanStatus::Running
    }

    /// Apply end options. Returns `false` if the span had already ended.
    pub fn finish(&mut self, end: SpanEnd) -> bool {
        if self.is_ended() {
            return false;
        }
        let now = Utc::now();
        self.status = if end.is_error() {
            SpanStatus::Failed
        } else {
            SpanStatus::Completed
        };
        self.level = end.level;
        self.status_message = end.status;
        self.output = end.output;
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        true
    }

    /// Mark the span as completed.
    pub fn complete(&mut self) -> bool {
        self.finish(SpanEnd::success())
    }

    /// Mark the span as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        self.finish(SpanEnd::error(error))
    }

    /// Attach an attribute to this span.
    pub fn annotate(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}
