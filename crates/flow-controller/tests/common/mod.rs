//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flow_controller::collaborators::{
    ExecutionStatus, FlowEvent, ModelDecision, ModelProvider, ModelRequest, MsgLogEntry,
    MsgLogWorker, Publisher, Querier, Screenshot, ScreenshotWorker, SubtaskRecord, TaskRecord,
    TermLogEntry, TermLogWorker, ToolCall, ToolDefinition, ToolExecutor, ToolOutput,
};
use flow_controller::flow_span::MemoryTracer;
use flow_controller::{
    Collaborators, CollaboratorError, FlowContext, RecordingError, RecordingPolicy,
};

#[derive(Default)]
pub struct MemoryDb {
    pub tasks: Mutex<Vec<TaskRecord>>,
    pub subtasks: Mutex<Vec<SubtaskRecord>>,
    pub statuses: Mutex<Vec<(String, i64, ExecutionStatus)>>,
    pub results: Mutex<HashMap<i64, String>>,
    pub fail_status_updates: bool,
}

impl MemoryDb {
    pub fn status_of(&self, level: &str, id: i64) -> Option<ExecutionStatus> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(l, i, _)| l == level && *i == id)
            .map(|(_, _, s)| *s)
    }

    fn push_status(
        &self,
        level: &str,
        id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError> {
        if self.fail_status_updates {
            return Err(CollaboratorError::unavailable("database"));
        }
        self.statuses
            .lock()
            .unwrap()
            .push((level.to_string(), id, status));
        Ok(())
    }
}

#[async_trait]
impl Querier for MemoryDb {
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
        self.push_status("flow", flow_id, status)
    }

    async fn update_task_status(
        &self,
        task_id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError> {
        self.push_status("task", task_id, status)
    }

    async fn update_subtask_status(
        &self,
        subtask_id: i64,
        status: ExecutionStatus,
    ) -> Result<(), CollaboratorError> {
        self.push_status("subtask", subtask_id, status)
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

/// Tool executor with per-tool canned failures.
#[derive(Default)]
pub struct FakeTools {
    pub failures: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
    pub delay: Option<std::time::Duration>,
}

impl FakeTools {
    pub fn failing(tool: &str, reason: &str) -> Self {
        let mut failures = HashMap::new();
        failures.insert(tool.to_string(), reason.to_string());
        Self {
            failures,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ToolExecutor for FakeTools {
    async fn execute(&self, call: ToolCall) -> Result<ToolOutput, CollaboratorError> {
        self.calls.lock().unwrap().push(call.name.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.get(&call.name) {
            Some(reason) => Err(CollaboratorError::msg(reason.clone())),
            None => Ok(ToolOutput::text(format!("{} output", call.name))),
        }
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "nmap".to_string(),
            description: "network scanner".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }]
    }
}

/// Provider that asks for `tool` once per message chain, then answers.
pub struct ToolThenAnswer {
    pub tool: String,
    seen: Mutex<Vec<i64>>,
}

impl ToolThenAnswer {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelProvider for ToolThenAnswer {
    fn name(&self) -> &str {
        "tool-then-answer"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelDecision, CollaboratorError> {
        let mut seen = self.seen.lock().unwrap();
        if seen.contains(&request.msg_chain_id) {
            return Ok(ModelDecision::Respond {
                content: request.observations.join("\n"),
            });
        }
        seen.push(request.msg_chain_id);
        Ok(ModelDecision::CallTools {
            calls: vec![ToolCall::new(self.tool.clone(), serde_json::json!({}))],
        })
    }
}

#[derive(Default)]
pub struct EventLog {
    pub events: Mutex<Vec<FlowEvent>>,
}

#[async_trait]
impl Publisher for EventLog {
    async fn publish(&self, event: FlowEvent) -> Result<(), CollaboratorError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryWorkers {
    pub fail: bool,
    pub terms: Mutex<Vec<TermLogEntry>>,
    pub msgs: Mutex<Vec<MsgLogEntry>>,
    pub shots: Mutex<Vec<Screenshot>>,
}

impl TermLogWorker for MemoryWorkers {
    fn append(&self, entry: TermLogEntry) -> Result<(), RecordingError> {
        if self.fail {
            return Err(RecordingError::QueueFull { worker: "term_log" });
        }
        self.terms.lock().unwrap().push(entry);
        Ok(())
    }
}

impl MsgLogWorker for MemoryWorkers {
    fn append(&self, entry: MsgLogEntry) -> Result<(), RecordingError> {
        if self.fail {
            return Err(RecordingError::QueueFull { worker: "msg_log" });
        }
        self.msgs.lock().unwrap().push(entry);
        Ok(())
    }
}

impl ScreenshotWorker for MemoryWorkers {
    fn append(&self, shot: Screenshot) -> Result<(), RecordingError> {
        if self.fail {
            return Err(RecordingError::QueueFull { worker: "screenshot" });
        }
        self.shots.lock().unwrap().push(shot);
        Ok(())
    }
}

/// Handles to every fake behind one flow.
pub struct Harness {
    pub tracer: MemoryTracer,
    pub db: Arc<MemoryDb>,
    pub tools: Arc<FakeTools>,
    pub events: Arc<EventLog>,
    pub workers: Arc<MemoryWorkers>,
    pub bundle: Arc<Collaborators>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(MemoryDb::default(), FakeTools::default(), MemoryWorkers::default(), RecordingPolicy::Continue)
    }

    pub fn build(
        db: MemoryDb,
        tools: FakeTools,
        workers: MemoryWorkers,
        policy: RecordingPolicy,
    ) -> Self {
        let tracer = MemoryTracer::new();
        let db = Arc::new(db);
        let tools = Arc::new(tools);
        let events = Arc::new(EventLog::default());
        let workers = Arc::new(workers);

        let bundle = Collaborators::builder()
            .db(db.clone())
            .executor(tools.clone())
            .provider(Arc::new(ToolThenAnswer::new("nmap")))
            .publisher(events.clone())
            .tracer(Arc::new(tracer.clone()))
            .term_log(workers.clone())
            .msg_log(workers.clone())
            .screenshot(workers.clone())
            .recording_policy(policy)
            .build()
            .unwrap();

        Self {
            tracer,
            db,
            tools,
            events,
            workers,
            bundle,
        }
    }

    pub fn flow(&self, user_id: i64, flow_id: i64, title: &str) -> FlowContext {
        FlowContext::new(user_id, flow_id, title, self.bundle.clone()).unwrap()
    }
}
