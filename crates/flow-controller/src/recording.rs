//! Recording policy for terminal, message and screenshot workers
//!
//! A failed append is logged and, by default, does not affect the unit of
//! work that produced it. `RecordingPolicy::EscalateAfter(n)` turns `n`
//! consecutive failures of one worker into a hard `ControllerError`.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::collaborators::{
    Attribution, MsgLogEntry, MsgLogKind, Screenshot, TermLogEntry, TermStream,
};
use crate::context::ExecutionScope;
use crate::error::{RecordingError, Result};

/// What to do when a recording worker rejects an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingPolicy {
    /// Log and continue
    #[default]
    Continue,
    /// Fail the unit of work after this many consecutive failures
    EscalateAfter(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    TermLog,
    MsgLog,
    Screenshot,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::TermLog => "term_log",
            WorkerKind::MsgLog => "msg_log",
            WorkerKind::Screenshot => "screenshot",
        }
    }

    fn index(&self) -> usize {
        match self {
            WorkerKind::TermLog => 0,
            WorkerKind::MsgLog => 1,
            WorkerKind::Screenshot => 2,
        }
    }
}

/// Applies the policy; counts consecutive failures per worker.
#[derive(Debug, Default)]
pub(crate) struct RecordingGuard {
    policy: RecordingPolicy,
    failures: [AtomicU32; 3],
}

impl RecordingGuard {
    pub(crate) fn new(policy: RecordingPolicy) -> Self {
        Self {
            policy,
            failures: Default::default(),
        }
    }

    pub(crate) fn policy(&self) -> RecordingPolicy {
        self.policy
    }

    #[cfg(test)]
    pub(crate) fn consecutive_failures(&self, worker: WorkerKind) -> u32 {
        self.failures[worker.index()].load(Ordering::Relaxed)
    }

    pub(crate) fn observe(
        &self,
        worker: WorkerKind,
        attribution: Attribution,
        outcome: std::result::Result<(), RecordingError>,
    ) -> Result<()> {
        let counter = &self.failures[worker.index()];
        let err = match outcome {
            Ok(()) => {
                counter.store(0, Ordering::Relaxed);
                return Ok(());
            }
            Err(err) => err,
        };

        let failures = counter.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        tracing::warn!(
            worker = worker.as_str(),
            flow_id = attribution.flow_id,
            task_id = ?attribution.task_id,
            subtask_id = ?attribution.subtask_id,
            failures,
            error = %err,
            "Recording append failed"
        );

        match self.policy {
            RecordingPolicy::EscalateAfter(limit) if failures >= limit.max(1) => {
                tracing::error!(
                    worker = worker.as_str(),
                    flow_id = attribution.flow_id,
                    failures,
                    "Escalating sustained recording failure"
                );
                Err(RecordingError::Sustained {
                    worker: worker.as_str(),
                    failures,
                }
                .into())
            }
            _ => Ok(()),
        }
    }
}

/// Attributed recording helpers available on every context level.
pub trait RecordExt: ExecutionScope {
    fn record_terminal(
        &self,
        stream: TermStream,
        container_id: Option<&str>,
        text: &str,
    ) -> Result<()> {
        let attribution = self.attribution();
        let entry = TermLogEntry {
            attribution,
            stream,
            container_id: container_id.map(str::to_string),
            text: text.to_string(),
            recorded_at: Utc::now(),
        };
        let collaborators = self.collaborators();
        let outcome = collaborators.term_log().append(entry);
        collaborators
            .recording()
            .observe(WorkerKind::TermLog, attribution, outcome)
    }

    fn record_message(&self, kind: MsgLogKind, message: &str, result: Option<&str>) -> Result<()> {
        let attribution = self.attribution();
        let entry = MsgLogEntry {
            attribution,
            kind,
            message: message.to_string(),
            result: result.map(str::to_string),
            recorded_at: Utc::now(),
        };
        let collaborators = self.collaborators();
        let outcome = collaborators.msg_log().append(entry);
        collaborators
            .recording()
            .observe(WorkerKind::MsgLog, attribution, outcome)
    }

    fn record_screenshot(&self, name: &str, url: &str) -> Result<()> {
        let attribution = self.attribution();
        let shot = Screenshot {
            attribution,
            name: name.to_string(),
            url: url.to_string(),
            recorded_at: Utc::now(),
        };
        let collaborators = self.collaborators();
        let outcome = collaborators.screenshot().append(shot);
        collaborators
            .recording()
            .observe(WorkerKind::Screenshot, attribution, outcome)
    }
}

impl<T: ExecutionScope + ?Sized> RecordExt for T {}
