//! Persistence contract
//!
//! Every call is assumed to be independently atomic. Multi-step
//! transactions belong to the implementation, not to the controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Lifecycle status stored for flows, tasks and subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Created,
    Running,
    Waiting,
    Finished,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Created => "created",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Waiting => "waiting",
            ExecutionStatus::Finished => "finished",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Finished | ExecutionStatus::Failed)
    }
}

/// A stored task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub flow_id: i64,
    pub title: String,
    pub input: String,
    pub status: ExecutionStatus,
}

/// A stored subtask row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskRecord {
    pub id: i64,
    pub task_id: i64,
    pub msg_chain_id: i64,
    pub title: String,
    pub description: String,
    pub status: ExecutionStatus,
}

/// Durable state queries used by the controller.
///
/// Implementations are shared by every context of a flow and must be safe
/// for concurrent use.
#[async_trait]
pub trait Querier: Send + Sync {
    /// Tasks of a flow in insertion order.
    async fn get_flow_tasks(&self, flow_id: i64) -> Result<Vec<TaskRecord>, CollaboratorError>;

    /// Subtasks of a task in insertion order.
    async fn get_task_subtasks(&self, task_id: i64)
        -> Result<Vec<SubtaskRecord>, CollaboratorError>;

    async fn update_flow_status(
        &self,
        flow_id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError>;

    async fn update_task_status(
        &self,
        task_id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError>;

    async fn update_subtask_status(
        &self,
        subtask_id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError>;

    async fn update_subtask_result(
        &self,
        subtask_id: i64,
        result: &str,
    ) -> Result<(), CollaboratorError>;
}
