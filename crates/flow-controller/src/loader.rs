//! Rebuild a flow plan from persistence for resumption.

use crate::collaborators::ExecutionStatus;
use crate::context::FlowContext;
use crate::error::{ControllerError, Result};
use crate::executor::{FlowPlan, SubtaskPlan, TaskPlan};

/// Read the stored tasks and subtasks of `flow`.
///
/// Returns `ControllerError::NothingToLoad` when the flow has no stored
/// tasks. Finished tasks and subtasks are skipped so a resumed flow only
/// repeats unfinished work.
pub async fn load_flow_plan(flow: &FlowContext) -> Result<FlowPlan> {
    let db = flow.collaborators().db();
    let stored = db
        .get_flow_tasks(flow.flow_id())
        .await
        .map_err(|e| ControllerError::wrap("load flow tasks", e))?;
    if stored.is_empty() {
        tracing::debug!(flow_id = flow.flow_id(), "No stored tasks to load");
        return Err(ControllerError::NothingToLoad);
    }

    let mut tasks = Vec::with_capacity(stored.len());
    for task in stored {
        if task.status == ExecutionStatus::Finished {
            continue;
        }

        let subtasks = db
            .get_task_subtasks(task.id)
            .await
            .map_err(|e| ControllerError::wrap(format!("load subtasks of task {}", task.id), e))?
            .into_iter()
            .filter(|s| s.status != ExecutionStatus::Finished)
            .map(|s| SubtaskPlan {
                subtask_id: s.id,
                msg_chain_id: s.msg_chain_id,
                title: s.title,
                description: s.description,
            })
            .collect();

        tasks.push(TaskPlan {
            task_id: task.id,
            title: task.title,
            input: task.input,
            subtasks,
        });
    }

    tracing::info!(
        flow_id = flow.flow_id(),
        tasks = tasks.len(),
        "Loaded flow plan"
    );
    Ok(FlowPlan::new(tasks))
}
