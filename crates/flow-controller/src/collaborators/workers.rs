//! Recording worker contracts
//!
//! Terminal log, message log and screenshot workers are append-only sinks.
//! `append` only enqueues: the controller never waits for durability, and
//! every entry names the flow/task/subtask that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordingError;

/// Which unit of work produced a recorded entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribution {
    pub flow_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermStream {
    Stdin,
    Stdout,
    Stderr,
}

/// One chunk of terminal traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermLogEntry {
    pub attribution: Attribution,
    pub stream: TermStream,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgLogKind {
    Thoughts,
    Tool,
    Terminal,
    Browser,
    File,
    Search,
    Advice,
    Ask,
    Input,
    Done,
    Report,
}

/// One agent message shown in the flow's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgLogEntry {
    pub attribution: Attribution,
    pub kind: MsgLogKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A captured screenshot reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub attribution: Attribution,
    pub name: String,
    pub url: String,
    pub recorded_at: DateTime<Utc>,
}

pub trait TermLogWorker: Send + Sync {
    fn append(&self, entry: TermLogEntry) -> Result<(), RecordingError>;
}

pub trait MsgLogWorker: Send + Sync {
    fn append(&self, entry: MsgLogEntry) -> Result<(), RecordingError>;
}

pub trait ScreenshotWorker: Send + Sync {
    fn append(&self, shot: Screenshot) -> Result<(), RecordingError>;
}
