//! task::operation
//!
//! The operation that runs one task definition across every repository.
//!
//! # Design
//!
//! Repositories are processed sequentially inside the operation;
//! parallelism lives between operations (the stage runner). Skips are
//! excluded from failure accounting; planning and execution failures
//! are collected per repository and returned as one aggregate so the
//! stage runner can flatten them.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::state::State;
use crate::core::task::TaskDefinition;
use crate::engine::environment::Environment;
use crate::engine::errors::{OperationError, TaskError};
use crate::engine::operation::Operation;

use super::executor::execute_task;
use super::planner::plan_task;

/// Runs a [`TaskDefinition`] across all repositories.
pub struct TaskOperation {
    task: TaskDefinition,
}

impl TaskOperation {
    /// Wrap a task definition.
    pub fn new(task: TaskDefinition) -> Self {
        Self { task }
    }
}

impl std::fmt::Debug for TaskOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskOperation")
            .field("task", &self.task.name)
            .finish()
    }
}

#[async_trait]
impl Operation for TaskOperation {
    fn name(&self) -> &str {
        &self.task.name
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        environment: &Environment,
        state: &State,
    ) -> Result<(), OperationError> {
        let mut failures: Vec<OperationError> = Vec::new();

        for index in 0..state.len() {
            let repository = state.snapshot(index);
            match plan_task(environment, &self.task, &repository).await {
                Err(err) => {
                    failures.push(OperationError::Other(anyhow::Error::new(err).context(
                        format!(
                            "planning task {} for {}",
                            self.task.name,
                            repository.path.display()
                        ),
                    )));
                }
                Ok(plan) => {
                    match execute_task(cancel, environment, &repository, &plan).await {
                        Ok(_) => {}
                        // Skips are intentional no-ops, never failures.
                        Err(TaskError::Skipped(_)) => {}
                        Err(TaskError::Failed(error)) => failures.push(error),
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OperationError::aggregate(failures))
        }
    }
}
