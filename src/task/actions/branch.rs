//! task::actions::branch
//!
//! Branch preparation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::git::{GitCommand, GitError};
use crate::report::{codes, Event};
use crate::task::context::ExecutionContext;

use super::{Action, Guard, StepError};

/// Create or reset the task branch via `checkout -B <branch> [<start>]`.
///
/// A start point that does not resolve is dropped with a warning event;
/// the branch is still prepared from the current head.
pub struct BranchPrepare {
    guards: Vec<Arc<dyn Guard>>,
}

impl BranchPrepare {
    /// Build the action with its guards.
    pub fn new(guards: Vec<Arc<dyn Guard>>) -> Self {
        Self { guards }
    }
}

impl std::fmt::Debug for BranchPrepare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchPrepare")
            .field("guards", &self.guards.len())
            .finish()
    }
}

#[async_trait]
impl Action for BranchPrepare {
    fn name(&self) -> &str {
        "branch.prepare"
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        let branch = ctx.plan.branch.clone();
        let mut start_point = ctx.plan.start_point.clone();

        if !start_point.is_empty() {
            let resolves = ctx
                .environment
                .git()
                .execute_git(
                    cancel,
                    GitCommand::new(["rev-parse", "--verify", "--quiet", start_point.as_str()])
                        .in_dir(&ctx.repository.path),
                )
                .await;
            match resolves {
                Ok(_) => {}
                Err(GitError::CommandFailed { .. }) => {
                    ctx.environment.report(
                        Event::warn(
                            codes::START_POINT_MISSING,
                            format!("start point {start_point} not found, branching from HEAD"),
                        )
                        .for_repository(
                            ctx.repository.effective_owner_repo(),
                            ctx.repository.path.clone(),
                        )
                        .detail("start_point", start_point.clone()),
                    );
                    start_point.clear();
                }
                Err(other) => return Err(other.into()),
            }
        }

        let mut args = vec!["checkout".to_string(), "-B".to_string(), branch.clone()];
        if !start_point.is_empty() {
            args.push(start_point);
        }
        ctx.environment
            .git()
            .execute_git(cancel, GitCommand::new(args).in_dir(&ctx.repository.path))
            .await?;

        ctx.branch_prepared = true;
        ctx.environment.report(
            Event::info(codes::REPO_SWITCHED, format!("switched to branch {branch}"))
                .for_repository(
                    ctx.repository.effective_owner_repo(),
                    ctx.repository.path.clone(),
                )
                .detail("branch", branch),
        );
        Ok(())
    }
}
