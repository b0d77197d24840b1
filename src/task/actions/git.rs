//! task::actions::git
//!
//! Staging, committing, and pushing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::git::GitCommand;
use crate::task::context::ExecutionContext;

use super::{Action, Guard, StepError};

/// Stage every applied file change with `git add`.
#[derive(Default)]
pub struct GitStage {
    guards: Vec<Arc<dyn Guard>>,
}

impl GitStage {
    /// Build the action.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Action for GitStage {
    fn name(&self) -> &str {
        "git.stage"
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        for change in ctx.plan.applied_files() {
            let path = change.path.display().to_string();
            ctx.environment
                .git()
                .execute_git(
                    cancel,
                    GitCommand::new(["add", path.as_str()]).in_dir(&ctx.repository.path),
                )
                .await?;
        }
        Ok(())
    }
}

/// Commit with the plan's message, optionally `--allow-empty`.
#[derive(Default)]
pub struct GitCommit {
    guards: Vec<Arc<dyn Guard>>,
}

impl GitCommit {
    /// Build the action.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Action for GitCommit {
    fn name(&self) -> &str {
        "git.commit"
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        let mut args = vec![
            "commit".to_string(),
            "-m".to_string(),
            ctx.plan.commit_message.clone(),
        ];
        if ctx.plan.allow_empty_commit {
            args.push("--allow-empty".to_string());
        }
        ctx.environment
            .git()
            .execute_git(cancel, GitCommand::new(args).in_dir(&ctx.repository.path))
            .await?;
        Ok(())
    }
}

/// Composed stage + commit.
pub struct GitStageCommit {
    stage: GitStage,
    commit: GitCommit,
    guards: Vec<Arc<dyn Guard>>,
}

impl GitStageCommit {
    /// Build the composite with its guards.
    pub fn new(guards: Vec<Arc<dyn Guard>>) -> Self {
        Self {
            stage: GitStage::new(),
            commit: GitCommit::new(),
            guards,
        }
    }
}

#[async_trait]
impl Action for GitStageCommit {
    fn name(&self) -> &str {
        "git.stage-commit"
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        self.stage.execute(cancel, ctx).await?;
        self.commit.execute(cancel, ctx).await
    }
}

/// Push the task branch with `git push --set-upstream`.
pub struct GitPush {
    guards: Vec<Arc<dyn Guard>>,
}

impl GitPush {
    /// Build the action with its guards (remote-configured).
    pub fn new(guards: Vec<Arc<dyn Guard>>) -> Self {
        Self { guards }
    }
}

#[async_trait]
impl Action for GitPush {
    fn name(&self) -> &str {
        "git.push"
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        ctx.environment
            .git()
            .execute_git(
                cancel,
                GitCommand::new([
                    "push",
                    "--set-upstream",
                    ctx.plan.push_remote.as_str(),
                    ctx.plan.branch.as_str(),
                ])
                .in_dir(&ctx.repository.path),
            )
            .await?;
        Ok(())
    }
}
