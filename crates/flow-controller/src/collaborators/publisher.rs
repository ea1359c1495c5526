//! Real-time event publisher contract
//!
//! Delivery is at-most-once from the controller's point of view; no
//! acknowledgment is expected beyond the call returning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowEventKind {
    FlowUpdated,
    TaskUpdated,
    SubtaskUpdated,
    TermLogAdded,
    MsgLogAdded,
    ScreenshotAdded,
}

/// An event visible to subscribers of one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    pub flow_id: i64,
    pub kind: FlowEventKind,
    pub payload: serde_json::Value,
}

impl FlowEvent {
    pub fn new(flow_id: i64, kind: FlowEventKind, payload: serde_json::Value) -> Self {
        Self {
            flow_id,
            kind,
            payload,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, event: FlowEvent) -> Result<(), CollaboratorError>;
}
