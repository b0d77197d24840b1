//! task::executor
//!
//! Executes a task plan against a single repository.
//!
//! # State machine
//!
//! ```text
//! Planned -> (Skipped | Prepared -> Executing -> (Applied | Failed | Skipped))
//! ```
//!
//! Terminal states are `Applied`, `Failed`, and `Skipped`. A skip from a
//! guard or action is reported as a `task.skip` event and surfaces as
//! [`TaskError::Skipped`], which upstream layers exclude from failure
//! accounting.
//!
//! # Branch restoration
//!
//! When file work will change branches, the original branch is recorded
//! up front and restored best-effort on every exit path; restoration
//! failures are ignored.

use tokio_util::sync::CancellationToken;

use crate::core::state::RepositoryState;
use crate::engine::environment::Environment;
use crate::engine::errors::{RepositorySkip, TaskError};
use crate::report::{codes, Event};

use super::actions::StepError;
use super::context::ExecutionContext;
use super::planner::TaskPlan;

/// Terminal state of a successfully handled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task applied its changes.
    Applied,
    /// The plan was a no-op and nothing ran.
    Skipped,
}

async fn run_steps(
    cancel: &CancellationToken,
    ctx: &mut ExecutionContext<'_>,
) -> Result<(), StepError> {
    let plan = ctx.plan;
    for step in &plan.workflow_steps {
        for guard in step.guards() {
            guard.check(cancel, ctx).await?;
        }
        step.execute(cancel, ctx).await?;
    }
    Ok(())
}

async fn restore_original_branch(cancel: &CancellationToken, ctx: &ExecutionContext<'_>) {
    if !ctx.branch_prepared {
        return;
    }
    let (Some(original), Some(manager)) =
        (ctx.original_branch.as_deref(), ctx.environment.repositories())
    else {
        return;
    };
    // Best effort: a failed restoration must not mask the task result.
    let _ = manager
        .checkout_branch(cancel, &ctx.repository.path, original)
        .await;
}

/// Execute a plan against one repository.
pub async fn execute_task(
    cancel: &CancellationToken,
    environment: &Environment,
    repository: &RepositoryState,
    plan: &TaskPlan,
) -> Result<TaskOutcome, TaskError> {
    let identity = repository.effective_owner_repo().to_string();
    let identity = if identity.is_empty() {
        repository.path.display().to_string()
    } else {
        identity
    };

    environment.report(
        Event::info(codes::TASK_PLAN, format!("planned task {}", plan.task_name))
            .for_repository(identity.clone(), repository.path.clone())
            .detail("task", plan.task_name.clone())
            .detail("branch", plan.branch.clone())
            .detail("start_point", plan.start_point.clone())
            .detail("files", plan.files.len().to_string())
            .detail(
                "applied_files",
                plan.applied_files().count().to_string(),
            )
            .detail("actions", plan.actions.len().to_string()),
    );

    if plan.skipped {
        let reason = plan
            .skip_reason
            .clone()
            .unwrap_or_else(|| "skipped".to_string());
        environment.report(
            Event::info(
                codes::TASK_SKIP,
                format!("task {} skipped: {reason}", plan.task_name),
            )
            .for_repository(identity, repository.path.clone())
            .detail("reason", reason),
        );
        return Ok(TaskOutcome::Skipped);
    }

    let mut ctx = ExecutionContext::new(
        environment,
        repository,
        plan,
        plan.effective_require_clean(),
        plan.safeguards.ignored_dirty_patterns.clone(),
    );

    if plan.has_file_work() {
        if let Some(manager) = environment.repositories() {
            ctx.original_branch = manager
                .current_branch(cancel, &repository.path)
                .await
                .ok();
        }
    }

    let result = run_steps(cancel, &mut ctx).await;
    restore_original_branch(cancel, &ctx).await;

    match result {
        Ok(()) => {
            let mut event = Event::info(
                codes::TASK_APPLY,
                format!("task {} applied", plan.task_name),
            )
            .for_repository(identity, repository.path.clone());
            if ctx.files_applied {
                event = event.detail("branch", plan.branch.clone());
            }
            if ctx.custom_actions_run > 0 {
                event = event.detail("actions", ctx.custom_actions_run.to_string());
            }
            environment.report(event);
            Ok(TaskOutcome::Applied)
        }
        Err(StepError::Skip(skip)) => {
            if ctx.should_warn_skip(&skip) {
                let mut event = Event::warn(
                    codes::TASK_SKIP,
                    format!("task {} skipped: {}", plan.task_name, skip.reason),
                )
                .for_repository(identity.clone(), repository.path.clone())
                .detail("reason", skip.reason.clone());
                for (key, value) in &skip.fields {
                    event = event.detail(key.clone(), value.clone());
                }
                environment.report(event);
            }
            ctx.request_skip(skip.clone());
            Err(TaskError::Skipped(RepositorySkip {
                repository: identity,
                skip,
            }))
        }
        Err(StepError::Fail(error)) => Err(TaskError::Failed(error)),
    }
}
