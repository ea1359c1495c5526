//! Flow execution driver
//!
//! Walks a `FlowPlan` level by level. Every level:
//!
//! 1. builds its context from the parent context
//! 2. opens one span nested under the parent span
//! 3. marks itself `Running` and publishes an update
//! 4. runs its children (or the `SubtaskRunner` at the leaf)
//! 5. ends its span exactly once and persists `Finished` or `Failed`
//!
//! A child failure is wrapped exactly once by its parent
//! (`execute task '<title>'`, `execute subtask '<title>'`), so the error
//! returned from `execute_flow` reads from the outermost attempt inward.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::collaborators::{ExecutionStatus, FlowEvent, FlowEventKind};
use crate::context::{ExecutionScope, FlowContext, SubtaskContext, TaskContext};
use crate::error::{CollaboratorError, ControllerError, Result};
use crate::span::{ScopedSpan, SpanOutcome, SpanState};
use crate::wrap::wrap_error_end_span;

// ============================================================================
// Plans and reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskPlan {
    pub subtask_id: i64,
    pub msg_chain_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub task_id: i64,
    pub title: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub subtasks: Vec<SubtaskPlan>,
}

/// Ordered tasks of one flow. An empty plan is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowPlan {
    #[serde(default)]
    pub tasks: Vec<TaskPlan>,
}

impl FlowPlan {
    pub fn new(tasks: Vec<TaskPlan>) -> Self {
        Self { tasks }
    }

    pub fn subtask_count(&self) -> usize {
        self.tasks.iter().map(|t| t.subtasks.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtaskReport {
    pub subtask_id: i64,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_id: i64,
    pub subtasks: Vec<SubtaskReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub flow_id: i64,
    pub trace_id: Uuid,
    pub tasks: Vec<TaskReport>,
}

/// How sibling tasks of one flow are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskConcurrency {
    #[default]
    Sequential,
    Concurrent,
}

impl std::str::FromStr for TaskConcurrency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(TaskConcurrency::Sequential),
            "concurrent" => Ok(TaskConcurrency::Concurrent),
            other => Err(format!("unknown task concurrency: {other}")),
        }
    }
}

// ============================================================================
// Runner contract
// ============================================================================

/// Does the work of one subtask.
///
/// The span is the subtask's own and is still active when `run` is called.
/// An implementation that fails may end it through `wrap_error_end_span`;
/// such an error is returned upward unchanged. If it returns an error with
/// the span still active, the driver wraps and ends it. An error returned
/// after the span was ended successfully is still wrapped as
/// `await subtask runner`, and the subtask is persisted `Failed`.
#[async_trait]
pub trait SubtaskRunner: Send + Sync {
    async fn run(&self, ctx: &SubtaskContext, span: &ScopedSpan) -> Result<String>;
}

// ============================================================================
// Executor
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct FlowExecutor {
    concurrency: TaskConcurrency,
}

impl FlowExecutor {
    pub fn new(concurrency: TaskConcurrency) -> Self {
        Self { concurrency }
    }

    pub fn concurrency(&self) -> TaskConcurrency {
        self.concurrency
    }

    /// Execute every task of `plan` under one flow span.
    ///
    /// Dropping the returned future (for example on a caller timeout) ends
    /// every open span through `ScopedSpan`'s drop, but persisted statuses
    /// are left as last written, typically `Running`. Status cleanup after an
    /// aborted future is the caller's job.
    pub async fn execute_flow(
        &self,
        flow: &FlowContext,
        plan: &FlowPlan,
        runner: &dyn SubtaskRunner,
    ) -> Result<FlowReport> {
        let span = ScopedSpan::root(flow, flow.flow_title());
        span.annotate("task_count", json!(plan.tasks.len()));

        tracing::info!(
            flow_id = flow.flow_id(),
            user_id = flow.user_id(),
            tasks = plan.tasks.len(),
            concurrency = ?self.concurrency,
            "Executing flow"
        );

        advance(flow, &span, ExecutionStatus::Running).await?;

        let outcomes = match self.concurrency {
            TaskConcurrency::Sequential => {
                let mut outcomes = Vec::with_capacity(plan.tasks.len());
                for task in &plan.tasks {
                    let outcome = self.execute_task(flow, &span, task, runner).await;
                    let failed = outcome.is_err();
                    outcomes.push(outcome);
                    if failed {
                        break;
                    }
                }
                outcomes
            }
            TaskConcurrency::Concurrent => {
                join_all(
                    plan.tasks
                        .iter()
                        .map(|task| self.execute_task(flow, &span, task, runner)),
                )
                .await
            }
        };

        let mut tasks = Vec::with_capacity(outcomes.len());
        let mut first_failure = None;
        for (plan_task, outcome) in plan.tasks.iter().zip(outcomes) {
            match outcome {
                Ok(report) => tasks.push(report),
                Err(err) if first_failure.is_none() => first_failure = Some((plan_task, err)),
                Err(err) => {
                    tracing::warn!(
                        flow_id = flow.flow_id(),
                        task_id = plan_task.task_id,
                        error = %err,
                        "Additional task failure"
                    );
                }
            }
        }

        if let Some((failed_task, err)) = first_failure {
            let err = wrap_error_end_span(
                flow,
                &span,
                &format!("execute task '{}'", failed_task.title),
                err,
            );
            settle_failed(flow).await;
            return Err(err);
        }

        advance(flow, &span, ExecutionStatus::Finished).await?;
        span.end_success_with(json!({ "tasks": tasks.len() }));

        tracing::info!(flow_id = flow.flow_id(), tasks = tasks.len(), "Flow finished");
        Ok(FlowReport {
            flow_id: flow.flow_id(),
            trace_id: flow.trace_id(),
            tasks,
        })
    }

    async fn execute_task(
        &self,
        flow: &FlowContext,
        flow_span: &ScopedSpan,
        plan: &TaskPlan,
        runner: &dyn SubtaskRunner,
    ) -> Result<TaskReport> {
        if flow.cancellation().is_cancelled() {
            return Err(ControllerError::Cancelled);
        }

        let ctx = TaskContext::new(flow, plan.task_id, plan.title.as_str(), plan.input.as_str())?;
        let span = flow_span.child(&ctx, plan.title.as_str());
        span.annotate("subtask_count", json!(plan.subtasks.len()));

        advance(&ctx, &span, ExecutionStatus::Running).await?;

        let mut subtasks = Vec::with_capacity(plan.subtasks.len());
        for subtask in &plan.subtasks {
            match self.execute_subtask(&ctx, &span, subtask, runner).await {
                Ok(report) => subtasks.push(report),
                Err(err) => {
                    let err = wrap_error_end_span(
                        &ctx,
                        &span,
                        &format!("execute subtask '{}'", subtask.title),
                        err,
                    );
                    settle_failed(&ctx).await;
                    return Err(err);
                }
            }
        }

        advance(&ctx, &span, ExecutionStatus::Finished).await?;
        span.end_success_with(json!({ "subtasks": subtasks.len() }));

        Ok(TaskReport {
            task_id: plan.task_id,
            subtasks,
        })
    }

    async fn execute_subtask(
        &self,
        task: &TaskContext,
        task_span: &ScopedSpan,
        plan: &SubtaskPlan,
        runner: &dyn SubtaskRunner,
    ) -> Result<SubtaskReport> {
        if task.cancellation().is_cancelled() {
            return Err(ControllerError::Cancelled);
        }

        let ctx = SubtaskContext::new(
            task,
            plan.msg_chain_id,
            plan.subtask_id,
            plan.title.as_str(),
            plan.description.as_str(),
        )?;
        let span = task_span.child(&ctx, plan.title.as_str());

        advance(&ctx, &span, ExecutionStatus::Running).await?;

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Err(ControllerError::Cancelled),
            result = runner.run(&ctx, &span) => result,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                let err = match span.state() {
                    SpanState::Active => {
                        wrap_error_end_span(&ctx, &span, "await subtask runner", err)
                    }
                    SpanState::Ended(SpanOutcome::Error) => err,
                    SpanState::Ended(SpanOutcome::Success) => {
                        tracing::warn!(
                            subtask_id = plan.subtask_id,
                            span_id = %span.span_id(),
                            error = %err,
                            "Runner failed after ending its span successfully"
                        );
                        ControllerError::wrap("await subtask runner", err)
                    }
                };
                settle_failed(&ctx).await;
                return Err(err);
            }
        };

        if let Err(e) = ctx
            .collaborators()
            .db()
            .update_subtask_result(plan.subtask_id, &result)
            .await
        {
            let err = wrap_error_end_span(&ctx, &span, "store subtask result", e);
            settle_failed(&ctx).await;
            return Err(err);
        }

        advance(&ctx, &span, ExecutionStatus::Finished).await?;
        span.end_success_with(json!({ "result": result }));

        Ok(SubtaskReport {
            subtask_id: plan.subtask_id,
            result,
        })
    }
}

// ============================================================================
// Status helpers
// ============================================================================

fn level_name<S: ExecutionScope + ?Sized>(scope: &S) -> &'static str {
    scope.identity().level.as_str()
}

async fn store_status<S: ExecutionScope + ?Sized>(
    scope: &S,
    status: ExecutionStatus,
) -> std::result::Result<(), CollaboratorError> {
    let id = scope.identity();
    let db = scope.collaborators().db();
    match (id.subtask_id, id.task_id) {
        (Some(subtask_id), _) => db.update_subtask_status(subtask_id, status).await,
        (None, Some(task_id)) => db.update_task_status(task_id, status).await,
        (None, None) => db.update_flow_status(id.flow_id, status).await,
    }
}

async fn publish_status<S: ExecutionScope + ?Sized>(
    scope: &S,
    status: ExecutionStatus,
) -> std::result::Result<(), CollaboratorError> {
    let id = scope.identity();
    let kind = match (id.subtask_id, id.task_id) {
        (Some(_), _) => FlowEventKind::SubtaskUpdated,
        (None, Some(_)) => FlowEventKind::TaskUpdated,
        (None, None) => FlowEventKind::FlowUpdated,
    };
    let payload = json!({
        "flow_id": id.flow_id,
        "task_id": id.task_id,
        "subtask_id": id.subtask_id,
        "status": status.as_str(),
    });
    scope
        .collaborators()
        .publisher()
        .publish(FlowEvent::new(id.flow_id, kind, payload))
        .await
}

/// Persist and publish a status change; a failure ends the span.
async fn advance<S: ExecutionScope + ?Sized>(
    scope: &S,
    span: &ScopedSpan,
    status: ExecutionStatus,
) -> Result<()> {
    let level = level_name(scope);
    if let Err(e) = store_status(scope, status).await {
        let err = wrap_error_end_span(scope, span, &format!("update {level} status"), e);
        settle_failed(scope).await;
        return Err(err);
    }
    if let Err(e) = publish_status(scope, status).await {
        let err = wrap_error_end_span(scope, span, &format!("publish {level} update"), e);
        settle_failed(scope).await;
        return Err(err);
    }
    Ok(())
}

/// Best-effort `Failed` status on an error path.
async fn settle_failed<S: ExecutionScope + ?Sized>(scope: &S) {
    let id = scope.identity();
    if let Err(e) = store_status(scope, ExecutionStatus::Failed).await {
        tracing::warn!(
            level = id.level.as_str(),
            flow_id = id.flow_id,
            task_id = ?id.task_id,
            subtask_id = ?id.subtask_id,
            error = %e,
            "Failed to persist failed status"
        );
    }
    if let Err(e) = publish_status(scope, ExecutionStatus::Failed).await {
        tracing::warn!(
            level = id.level.as_str(),
            flow_id = id.flow_id,
            error = %e,
            "Failed to publish failed status"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
