//! Trace context threaded from a parent span into its children.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiers needed to link a new span into an existing trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// Unique identifier for the overall trace (one per flow).
    pub trace_id: Uuid,
    /// Span ID of the parent span, `None` for a root span.
    pub parent_span_id: Option<Uuid>,
}

impl TraceContext {
    /// Start a new trace with no parent.
    pub fn root() -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            parent_span_id: None,
        }
    }

    pub fn child_of(trace_id: Uuid, parent_span_id: Uuid) -> Self {
        Self {
            trace_id,
            parent_span_id: Some(parent_span_id),
        }
    }
}
