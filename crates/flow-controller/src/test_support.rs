//! Fake collaborators for unit tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flow_span::{MemoryTracer, NoopTracer, Tracer};

use crate::collaborators::{
    Collaborators, ExecutionStatus, FlowEvent, ModelDecision, ModelProvider, ModelRequest,
    MsgLogEntry, MsgLogWorker, Publisher, Querier, Screenshot, ScreenshotWorker, SubtaskRecord,
    TaskRecord, TermLogEntry, TermLogWorker, ToolCall, ToolDefinition, ToolExecutor, ToolOutput,
};
use crate::error::{CollaboratorError, RecordingError};
use crate::recording::RecordingPolicy;

/// In-memory store of tasks, subtasks and status writes.
#[derive(Default)]
pub(crate) struct FakeQuerier {
    pub tasks: Mutex<Vec<TaskRecord>>,
    pub subtasks: Mutex<Vec<SubtaskRecord>>,
    pub statuses: Mutex<Vec<(&'static str, i64, ExecutionStatus)>>,
    pub results: Mutex<HashMap<i64, String>>,
}

impl FakeQuerier {
    pub fn statuses(&self) -> Vec<(&'static str, i64, ExecutionStatus)> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Querier for FakeQuerier {
    async fn get_flow_tasks(&self, flow_id: i64) -> Result<Vec<TaskRecord>, CollaboratorError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.flow_id == flow_id)
            .cloned()
            .collect())
    }

    async fn get_task_subtasks(
        &self,
        task_id: i64,
    ) -> Result<Vec<SubtaskRecord>, CollaboratorError> {
        Ok(self
            .subtasks
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn update_flow_status(
        &self,
        flow_id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError> {
        self.statuses.lock().unwrap().push(("flow", flow_id, status));
        Ok(())
    }

    async fn update_task_status(
        &self,
        task_id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError> {
        self.statuses.lock().unwrap().push(("task", task_id, status));
        Ok(())
    }

    async fn update_subtask_status(
        &self,
        subtask_id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError> {
        self.statuses
            .lock()
            .unwrap()
            .push(("subtask", subtask_id, status));
        Ok(())
    }

    async fn update_subtask_result(
        &self,
        subtask_id: i64,
        result: &str,
    ) -> Result<(), CollaboratorError> {
        self.results
            .lock()
            .unwrap()
            .insert(subtask_id, result.to_string());
        Ok(())
    }
}

/// Executor that echoes the tool name, or refuses every call.
#[derive(Default)]
pub(crate) struct EchoExecutor {
    pub refuse_with: Option<String>,
}

#[async_trait]
impl ToolExecutor for EchoExecutor {
    async fn execute(&self, call: ToolCall) -> Result<ToolOutput, CollaboratorError> {
        match &self.refuse_with {
            Some(reason) => Err(CollaboratorError::msg(reason.clone())),
            None => Ok(ToolOutput::text(format!("{} ok", call.name))),
        }
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }
}

/// Provider that answers with scripted decisions, then echoes the prompt.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    pub script: Mutex<Vec<ModelDecision>>,
}

impl ScriptedProvider {
    pub fn new(mut script: Vec<ModelDecision>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelDecision, CollaboratorError> {
        let next = self.script.lock().unwrap().pop();
        Ok(next.unwrap_or(ModelDecision::Respond {
            content: request.prompt,
        }))
    }
}

#[derive(Default)]
pub(crate) struct RecordingPublisher {
    pub events: Mutex<Vec<FlowEvent>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, event: FlowEvent) -> Result<(), CollaboratorError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Recording workers that keep entries in memory or reject every append.
#[derive(Clone, Default)]
pub(crate) struct FakeWorkers {
    fail: bool,
    terms: Arc<Mutex<Vec<TermLogEntry>>>,
    msgs: Arc<Mutex<Vec<MsgLogEntry>>>,
    shots: Arc<Mutex<Vec<Screenshot>>>,
}

impl FakeWorkers {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn term_entries(&self) -> Vec<TermLogEntry> {
        self.terms.lock().unwrap().clone()
    }

    pub fn msg_entries(&self) -> Vec<MsgLogEntry> {
        self.msgs.lock().unwrap().clone()
    }

    pub fn screenshots(&self) -> Vec<Screenshot> {
        self.shots.lock().unwrap().clone()
    }

    fn push<T>(&self, store: &Mutex<Vec<T>>, worker: &'static str, item: T) -> Result<(), RecordingError> {
        if self.fail {
            return Err(RecordingError::Closed { worker });
        }
        store.lock().unwrap().push(item);
        Ok(())
    }
}

impl TermLogWorker for FakeWorkers {
    fn append(&self, entry: TermLogEntry) -> Result<(), RecordingError> {
        self.push(&self.terms, "term_log", entry)
    }
}

impl MsgLogWorker for FakeWorkers {
    fn append(&self, entry: MsgLogEntry) -> Result<(), RecordingError> {
        self.push(&self.msgs, "msg_log", entry)
    }
}

impl ScreenshotWorker for FakeWorkers {
    fn append(&self, shot: Screenshot) -> Result<(), RecordingError> {
        self.push(&self.shots, "screenshot", shot)
    }
}

/// Fully wired bundle around the given parts.
pub(crate) fn bundle_from(
    db: Arc<dyn Querier>,
    executor: Arc<dyn ToolExecutor>,
    tracer: Arc<dyn Tracer>,
    workers: &FakeWorkers,
    policy: RecordingPolicy,
) -> Arc<Collaborators> {
    Collaborators::builder()
        .db(db)
        .executor(executor)
        .provider(Arc::new(ScriptedProvider::default()))
        .publisher(Arc::new(RecordingPublisher::default()))
        .tracer(tracer)
        .term_log(Arc::new(workers.clone()))
        .msg_log(Arc::new(workers.clone()))
        .screenshot(Arc::new(workers.clone()))
        .recording_policy(policy)
        .build()
        .unwrap()
}

pub(crate) fn bundle() -> Arc<Collaborators> {
    bundle_with(&FakeWorkers::default(), RecordingPolicy::Continue)
}

pub(crate) fn bundle_with(workers: &FakeWorkers, policy: RecordingPolicy) -> Arc<Collaborators> {
    bundle_from(
        Arc::new(FakeQuerier::default()),
        Arc::new(EchoExecutor::default()),
        Arc::new(NoopTracer),
        workers,
        policy,
    )
}

pub(crate) fn traced_bundle(tracer: &MemoryTracer) -> Arc<Collaborators> {
    bundle_from(
        Arc::new(FakeQuerier::default()),
        Arc::new(EchoExecutor::default()),
        Arc::new(tracer.clone()),
        &FakeWorkers::default(),
        RecordingPolicy::Continue,
    )
}
