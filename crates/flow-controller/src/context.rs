//! Context Hierarchy
//!
//! Three strongly typed, read-only contexts thread identity and the shared
//! collaborator bundle from a flow down to its subtasks:
//!
//! 1. `FlowContext` - user, flow identity and the `Collaborators` bundle
//! 2. `TaskContext` - a `FlowContext` plus task identity
//! 3. `SubtaskContext` - a `TaskContext` plus subtask identity and message chain
//!
//! Children hold their parent by value and only ever add identity fields.
//! Ancestor fields are plain reads through forwarding accessors, so there is
//! no "ancestor not found" failure mode. The `ExecutionScope` trait lets a
//! callee accept any level without knowing which one it was handed.

use std::collections::HashMap;
use std::sync::Arc;

use flow_span::SpanKind;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::collaborators::{Attribution, Collaborators};
use crate::error::{ControllerError, Result};

/// Identity of one unit of work, independent of its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeIdentity {
    pub level: SpanKind,
    pub user_id: i64,
    pub flow_id: i64,
    pub task_id: Option<i64>,
    pub subtask_id: Option<i64>,
    pub msg_chain_id: Option<i64>,
}

impl ScopeIdentity {
    pub fn attribution(&self) -> Attribution {
        Attribution {
            flow_id: self.flow_id,
            task_id: self.task_id,
            subtask_id: self.subtask_id,
        }
    }

    /// Identity fields as span attributes.
    pub fn span_attributes(&self) -> HashMap<String, serde_json::Value> {
        let mut attributes = HashMap::new();
        attributes.insert("user_id".to_string(), self.user_id.into());
        attributes.insert("flow_id".to_string(), self.flow_id.into());
        if let Some(task_id) = self.task_id {
            attributes.insert("task_id".to_string(), task_id.into());
        }
        if let Some(subtask_id) = self.subtask_id {
            attributes.insert("subtask_id".to_string(), subtask_id.into());
        }
        if let Some(msg_chain_id) = self.msg_chain_id {
            attributes.insert("msg_chain_id".to_string(), msg_chain_id.into());
        }
        attributes
    }
}

/// Level-agnostic read access to a context.
pub trait ExecutionScope: Send + Sync {
    fn identity(&self) -> ScopeIdentity;

    /// The flow this scope descends from.
    fn flow(&self) -> &FlowContext;

    /// Token cancelled when this scope or any ancestor is cancelled.
    fn cancellation(&self) -> &CancellationToken;

    fn collaborators(&self) -> &Collaborators {
        self.flow().collaborators()
    }

    fn trace_id(&self) -> Uuid {
        self.flow().trace_id()
    }

    fn attribution(&self) -> Attribution {
        self.identity().attribution()
    }
}

fn require_id(context: &'static str, field: &'static str, id: i64) -> Result<i64> {
    if id <= 0 {
        return Err(ControllerError::invalid_id(context, field));
    }
    Ok(id)
}

fn require_text(context: &'static str, field: &'static str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(ControllerError::empty_field(context, field));
    }
    Ok(value)
}

// ============================================================================
// FlowContext
// ============================================================================

/// Identity and collaborators of one top-level flow.
#[derive(Debug, Clone)]
pub struct FlowContext {
    user_id: i64,
    flow_id: i64,
    flow_title: String,
    trace_id: Uuid,
    cancel: CancellationToken,
    collaborators: Arc<Collaborators>,
}

impl FlowContext {
    pub fn new(
        user_id: i64,
        flow_id: i64,
        flow_title: impl Into<String>,
        collaborators: Arc<Collaborators>,
    ) -> Result<Self> {
        Ok(Self {
            user_id: require_id("flow", "user_id", user_id)?,
            flow_id: require_id("flow", "flow_id", flow_id)?,
            flow_title: require_text("flow", "flow_title", flow_title.into())?,
            trace_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            collaborators,
        })
    }

    /// Use a caller-owned cancellation token for this flow.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Join an existing trace instead of starting a new one.
    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn flow_id(&self) -> i64 {
        self.flow_id
    }

    pub fn flow_title(&self) -> &str {
        &self.flow_title
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Shared handle to the bundle, for callers that outlive this borrow.
    pub fn collaborators_arc(&self) -> Arc<Collaborators> {
        Arc::clone(&self.collaborators)
    }

    /// Cancel this flow and every task/subtask context built from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl ExecutionScope for FlowContext {
    fn identity(&self) -> ScopeIdentity {
        ScopeIdentity {
            level: SpanKind::Flow,
            user_id: self.user_id,
            flow_id: self.flow_id,
            task_id: None,
            subtask_id: None,
            msg_chain_id: None,
        }
    }

    fn flow(&self) -> &FlowContext {
        self
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ============================================================================
// TaskContext
// ============================================================================

/// A task within a flow.
///
/// Task input may be empty; task id and title may not.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: i64,
    task_title: String,
    task_input: String,
    cancel: CancellationToken,
    flow: FlowContext,
}

impl TaskContext {
    pub fn new(
        flow: &FlowContext,
        task_id: i64,
        task_title: impl Into<String>,
        task_input: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            task_id: require_id("task", "task_id", task_id)?,
            task_title: require_text("task", "task_title", task_title.into())?,
            task_input: task_input.into(),
            cancel: flow.cancel.child_token(),
            flow: flow.clone(),
        })
    }

    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    pub fn task_title(&self) -> &str {
        &self.task_title
    }

    pub fn task_input(&self) -> &str {
        &self.task_input
    }

    pub fn flow(&self) -> &FlowContext {
        &self.flow
    }

    pub fn user_id(&self) -> i64 {
        self.flow.user_id
    }

    pub fn flow_id(&self) -> i64 {
        self.flow.flow_id
    }

    pub fn flow_title(&self) -> &str {
        &self.flow.flow_title
    }

    pub fn collaborators(&self) -> &Collaborators {
        self.flow.collaborators()
    }

    /// Cancel this task and its subtasks; the flow is unaffected.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl ExecutionScope for TaskContext {
    fn identity(&self) -> ScopeIdentity {
        ScopeIdentity {
            level: SpanKind::Task,
            task_id: Some(self.task_id),
            ..self.flow.identity()
        }
    }

    fn flow(&self) -> &FlowContext {
        &self.flow
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ============================================================================
// SubtaskContext
// ============================================================================

/// A subtask within a task, bound to one model message chain.
///
/// Subtask description may be empty; ids and title may not.
#[derive(Debug, Clone)]
pub struct SubtaskContext {
    msg_chain_id: i64,
    subtask_id: i64,
    subtask_title: String,
    subtask_description: String,
    cancel: CancellationToken,
    task: TaskContext,
}

impl SubtaskContext {
    pub fn new(
        task: &TaskContext,
        msg_chain_id: i64,
        subtask_id: i64,
        subtask_title: impl Into<String>,
        subtask_description: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            msg_chain_id: require_id("subtask", "msg_chain_id", msg_chain_id)?,
            subtask_id: require_id("subtask", "subtask_id", subtask_id)?,
            subtask_title: require_text("subtask", "subtask_title", subtask_title.into())?,
            subtask_description: subtask_description.into(),
            cancel: task.cancel.child_token(),
            task: task.clone(),
        })
    }

    pub fn msg_chain_id(&self) -> i64 {
        self.msg_chain_id
    }

    pub fn subtask_id(&self) -> i64 {
        self.subtask_id
    }

    pub fn subtask_title(&self) -> &str {
        &self.subtask_title
    }

    pub fn subtask_description(&self) -> &str {
        &self.subtask_description
    }

    pub fn task(&self) -> &TaskContext {
        &self.task
    }

    pub fn task_id(&self) -> i64 {
        self.task.task_id
    }

    pub fn task_title(&self) -> &str {
        &self.task.task_title
    }

    pub fn task_input(&self) -> &str {
        &self.task.task_input
    }

    pub fn flow(&self) -> &FlowContext {
        &self.task.flow
    }

    pub fn user_id(&self) -> i64 {
        self.task.user_id()
    }

    pub fn flow_id(&self) -> i64 {
        self.task.flow_id()
    }

    pub fn flow_title(&self) -> &str {
        self.task.flow_title()
    }

    pub fn collaborators(&self) -> &Collaborators {
        self.task.collaborators()
    }
}

impl ExecutionScope for SubtaskContext {
    fn identity(&self) -> ScopeIdentity {
        ScopeIdentity {
            level: SpanKind::Subtask,
            subtask_id: Some(self.subtask_id),
            msg_chain_id: Some(self.msg_chain_id),
            ..self.task.identity()
        }
    }

    fn flow(&self) -> &FlowContext {
        &self.task.flow
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ============================================================================
// Tests
// ============================================================================
