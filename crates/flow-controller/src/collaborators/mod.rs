//! Collaborator Bundle
//!
//! The injected capabilities a flow needs: persistence, tool executor,
//! model provider, publisher, tracer and the three recording workers.
//! A bundle is built once per flow and shared by reference with every task
//! and subtask context descending from it. It has no setters.
//!
//! # Example
//!
//! ```rust,ignore
//! use flow_controller::collaborators::CollaboratorsBuilder;
//!
//! let bundle = CollaboratorsBuilder::new()
//!     .db(db)
//!     .executor(executor)
//!     .provider(provider)
//!     .publisher(publisher)
//!     .tracer(tracer)
//!     .term_log(worker.clone())
//!     .msg_log(worker.clone())
//!     .screenshot(worker)
//!     .build()?;
//! ```

pub mod persistence;
pub mod provider;
pub mod publisher;
pub mod tools;
pub mod workers;

pub use persistence::{ExecutionStatus, Querier, SubtaskRecord, TaskRecord};
pub use provider::{ModelDecision, ModelProvider, ModelRequest};
pub use publisher::{FlowEvent, FlowEventKind, Publisher};
pub use tools::{ToolCall, ToolDefinition, ToolExecutor, ToolOutput};
pub use workers::{
    Attribution, MsgLogEntry, MsgLogKind, MsgLogWorker, Screenshot, ScreenshotWorker,
    TermLogEntry, TermLogWorker, TermStream,
};

use std::fmt;
use std::sync::Arc;

use flow_span::Tracer;

use crate::error::{ControllerError, Result};
use crate::recording::{RecordingGuard, RecordingPolicy};

/// Immutable set of collaborators shared by one flow and all its descendants.
pub struct Collaborators {
    db: Arc<dyn Querier>,
    executor: Arc<dyn ToolExecutor>,
    provider: Arc<dyn ModelProvider>,
    publisher: Arc<dyn Publisher>,
    tracer: Arc<dyn Tracer>,
    term_log: Arc<dyn TermLogWorker>,
    msg_log: Arc<dyn MsgLogWorker>,
    screenshot: Arc<dyn ScreenshotWorker>,
    recording: RecordingGuard,
}

impl Collaborators {
    pub fn builder() -> CollaboratorsBuilder {
        CollaboratorsBuilder::new()
    }

    pub fn db(&self) -> &Arc<dyn Querier> {
        &self.db
    }

    pub fn executor(&self) -> &Arc<dyn ToolExecutor> {
        &self.executor
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    pub fn term_log(&self) -> &Arc<dyn TermLogWorker> {
        &self.term_log
    }

    pub fn msg_log(&self) -> &Arc<dyn MsgLogWorker> {
        &self.msg_log
    }

    pub fn screenshot(&self) -> &Arc<dyn ScreenshotWorker> {
        &self.screenshot
    }

    pub(crate) fn recording(&self) -> &RecordingGuard {
        &self.recording
    }

    pub fn recording_policy(&self) -> RecordingPolicy {
        self.recording.policy()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("provider", &self.provider.name())
            .field("recording_policy", &self.recording.policy())
            .finish_non_exhaustive()
    }
}

/// Builder that refuses to produce a partially wired bundle.
#[derive(Default)]
pub struct CollaboratorsBuilder {
    db: Option<Arc<dyn Querier>>,
    executor: Option<Arc<dyn ToolExecutor>>,
    provider: Option<Arc<dyn ModelProvider>>,
    publisher: Option<Arc<dyn Publisher>>,
    tracer: Option<Arc<dyn Tracer>>,
    term_log: Option<Arc<dyn TermLogWorker>>,
    msg_log: Option<Arc<dyn MsgLogWorker>>,
    screenshot: Option<Arc<dyn ScreenshotWorker>>,
    recording_policy: RecordingPolicy,
}

impl CollaboratorsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn db(mut self, db: Arc<dyn Querier>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn term_log(mut self, worker: Arc<dyn TermLogWorker>) -> Self {
        self.term_log = Some(worker);
        self
    }

    pub fn msg_log(mut self, worker: Arc<dyn MsgLogWorker>) -> Self {
        self.msg_log = Some(worker);
        self
    }

    pub fn screenshot(mut self, worker: Arc<dyn ScreenshotWorker>) -> Self {
        self.screenshot = Some(worker);
        self
    }

    pub fn recording_policy(mut self, policy: RecordingPolicy) -> Self {
        self.recording_policy = policy;
        self
    }

    /// Build the bundle, failing on the first missing member.
    pub fn build(self) -> Result<Arc<Collaborators>> {
        Ok(Arc::new(Collaborators {
            db: self.db.ok_or_else(|| ControllerError::missing_collaborator("db"))?,
            executor: self
                .executor
                .ok_or_else(|| ControllerError::missing_collaborator("executor"))?,
            provider: self
                .provider
                .ok_or_else(|| ControllerError::missing_collaborator("provider"))?,
            publisher: self
                .publisher
                .ok_or_else(|| ControllerError::missing_collaborator("publisher"))?,
            tracer: self
                .tracer
                .ok_or_else(|| ControllerError::missing_collaborator("tracer"))?,
            term_log: self
                .term_log
                .ok_or_else(|| ControllerError::missing_collaborator("term_log"))?,
            msg_log: self
                .msg_log
                .ok_or_else(|| ControllerError::missing_collaborator("msg_log"))?,
            screenshot: self
                .screenshot
                .ok_or_else(|| ControllerError::missing_collaborator("screenshot"))?,
            recording: RecordingGuard::new(self.recording_policy),
        }))
    }
}
