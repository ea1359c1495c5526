//! Model/tool subtask runner
//!
//! A `SubtaskRunner` that alternates between asking the model provider for
//! a decision and invoking the tools it asked for, until the model answers
//! or the iteration limit is reached. Every collaborator failure is wrapped
//! and closes the subtask span at the call site.

use std::time::Duration;

use async_trait::async_trait;

use crate::collaborators::{ModelDecision, ModelRequest, MsgLogKind, TermStream, ToolCall};
use crate::context::{ExecutionScope, SubtaskContext};
use crate::error::{CollaboratorError, ControllerError, Result};
use crate::executor::SubtaskRunner;
use crate::recording::RecordExt;
use crate::span::ScopedSpan;
use crate::wrap::wrap_error_end_span;

pub const DEFAULT_MAX_ITERATIONS: u32 = 16;

#[derive(Debug, Clone)]
pub struct ModelToolRunner {
    max_iterations: u32,
    tool_timeout: Option<Duration>,
}

impl Default for ModelToolRunner {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: None,
        }
    }
}

impl ModelToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Fail a tool call that does not return within `timeout`.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    fn prompt(ctx: &SubtaskContext) -> String {
        let mut prompt = format!("Task: {}\n", ctx.task_title());
        if !ctx.task_input().is_empty() {
            prompt.push_str(&format!("Input: {}\n", ctx.task_input()));
        }
        prompt.push_str(&format!("Subtask: {}\n", ctx.subtask_title()));
        if !ctx.subtask_description().is_empty() {
            prompt.push_str(&format!("Details: {}\n", ctx.subtask_description()));
        }
        prompt
    }

    async fn invoke(
        &self,
        ctx: &SubtaskContext,
        call: ToolCall,
    ) -> std::result::Result<String, CollaboratorError> {
        let executor = ctx.collaborators().executor();
        let output = match self.tool_timeout {
            Some(limit) => tokio::time::timeout(limit, executor.execute(call))
                .await
                .map_err(|_| CollaboratorError::Timeout(limit))??,
            None => executor.execute(call).await?,
        };
        Ok(output.content)
    }
}

#[async_trait]
impl SubtaskRunner for ModelToolRunner {
    async fn run(&self, ctx: &SubtaskContext, span: &ScopedSpan) -> Result<String> {
        let provider = ctx.collaborators().provider();
        let tools = ctx.collaborators().executor().definitions();
        let prompt = Self::prompt(ctx);
        let mut observations = Vec::new();

        span.annotate("provider", serde_json::json!(provider.name()));

        for iteration in 1..=self.max_iterations {
            if ctx.cancellation().is_cancelled() {
                return Err(wrap_error_end_span(
                    ctx,
                    span,
                    "run model loop",
                    ControllerError::Cancelled,
                ));
            }

            let mut request =
                ModelRequest::new(ctx.msg_chain_id(), prompt.as_str()).with_tools(tools.clone());
            request.observations = std::mem::take(&mut observations);

            let decision = match provider.complete(request).await {
                Ok(decision) => decision,
                Err(e) => return Err(wrap_error_end_span(ctx, span, "call model provider", e)),
            };

            let calls = match decision {
                ModelDecision::Respond { content } => {
                    span.annotate("iterations", serde_json::json!(iteration));
                    ctx.record_message(MsgLogKind::Done, &content, None)?;
                    return Ok(content);
                }
                ModelDecision::CallTools { calls } => calls,
            };

            tracing::debug!(
                flow_id = ctx.flow_id(),
                subtask_id = ctx.subtask_id(),
                iteration,
                calls = calls.len(),
                "Invoking tools"
            );

            for call in calls {
                let name = call.name.clone();
                ctx.record_message(MsgLogKind::Tool, &name, None)?;
                match self.invoke(ctx, call).await {
                    Ok(content) => {
                        ctx.record_terminal(TermStream::Stdout, None, &content)?;
                        observations.push(content);
                    }
                    Err(e) => {
                        return Err(wrap_error_end_span(
                            ctx,
                            span,
                            &format!("invoke tool {name}"),
                            e,
                        ))
                    }
                }
            }
        }

        Err(wrap_error_end_span(
            ctx,
            span,
            "run model loop",
            format!("no answer after {} iterations", self.max_iterations),
        ))
    }
}
