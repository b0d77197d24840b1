//! task::guards
//!
//! Built-in guards: clean worktree, branch absence, remote configured.
//!
//! # Skip-vs-error duality
//!
//! A guard returning [`StepError::Skip`] means "this task intentionally
//! does not apply here"; any other error fails the task. Guards never
//! mutate the repository.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::errors::ActionSkip;
use crate::git::{GitCommand, GitError};
use crate::report::{codes, Event};
use crate::task::actions::{Guard, StepError};
use crate::task::context::ExecutionContext;

/// Skip reason for a dirty repository.
pub const REASON_DIRTY: &str = "repository dirty";
/// Skip reason for an already-existing branch.
pub const REASON_BRANCH_EXISTS: &str = "branch exists";
/// Skip reason for a missing push-remote setting.
pub const REASON_REMOTE_UNCONFIGURED: &str =
    "push remote not configured (set task.branch.push_remote)";
/// Skip reason when the remote lookup itself failed.
pub const REASON_REMOTE_LOOKUP_FAILED: &str = "remote lookup failed";
/// Skip reason for a configured remote without a URL.
pub const REASON_REMOTE_MISSING: &str = "remote missing";

/// Skips when the repository worktree is dirty.
///
/// The check is memoized on the execution context, so a clean result
/// observed once is not re-queried. Entries matching any ignored-dirty
/// pattern do not count as dirty; the surviving entries are carried in
/// the skip's `status` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanWorktreeGuard;

impl CleanWorktreeGuard {
    /// Create the guard.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Guard for CleanWorktreeGuard {
    fn name(&self) -> &'static str {
        "clean-worktree"
    }

    async fn check(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        if !ctx.require_clean {
            return Ok(());
        }

        let check = match ctx.worktree_check() {
            Some(check) => check.clone(),
            None => {
                let manager = ctx.environment.repositories().ok_or_else(|| {
                    StepError::Fail(
                        anyhow::anyhow!(
                            "clean-worktree guard requires a repository manager"
                        )
                        .into(),
                    )
                })?;
                let entries = manager
                    .check_clean_worktree(cancel, &ctx.repository.path)
                    .await?;
                let remaining: Vec<String> = entries
                    .into_iter()
                    .filter(|entry| {
                        !ctx.ignored_dirty_patterns
                            .iter()
                            .any(|pattern| entry.contains(pattern.as_str()))
                    })
                    .collect();
                let check = crate::task::context::WorktreeCheck {
                    clean: remaining.is_empty(),
                    entries: remaining,
                };
                ctx.store_worktree_check(check.clean, check.entries.clone());
                check
            }
        };

        if check.clean {
            return Ok(());
        }
        let status = check
            .entries
            .iter()
            .map(|entry| entry.trim())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ActionSkip::new(REASON_DIRTY).field("status", status).into())
    }
}

/// Skips when a branch already exists.
///
/// Empty branch names pass.
#[derive(Debug, Clone)]
pub struct BranchAbsentGuard {
    branch: String,
}

impl BranchAbsentGuard {
    /// Guard against the given branch name.
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
        }
    }
}

#[async_trait]
impl Guard for BranchAbsentGuard {
    fn name(&self) -> &'static str {
        "branch-absent"
    }

    async fn check(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        if self.branch.is_empty() {
            return Ok(());
        }
        let probe = format!("refs/heads/{}", self.branch);
        let result = ctx
            .environment
            .git()
            .execute_git(
                cancel,
                GitCommand::new(["rev-parse", "--verify", "--quiet", probe.as_str()])
                    .in_dir(&ctx.repository.path),
            )
            .await;
        match result {
            Ok(_) => Err(ActionSkip::new(REASON_BRANCH_EXISTS)
                .field("branch", self.branch.clone())
                .into()),
            Err(GitError::CommandFailed { .. }) => Ok(()),
            Err(other) => Err(other.into()),
        }
    }
}

/// Skips when the push remote is unset, unreadable, or empty.
#[derive(Debug, Clone)]
pub struct RemoteConfiguredGuard {
    remote: String,
}

impl RemoteConfiguredGuard {
    /// Guard against the given remote name.
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }
}

#[async_trait]
impl Guard for RemoteConfiguredGuard {
    fn name(&self) -> &'static str {
        "remote-configured"
    }

    async fn check(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        if self.remote.is_empty() {
            return Err(ActionSkip::new(REASON_REMOTE_UNCONFIGURED).into());
        }
        let result = ctx
            .environment
            .git()
            .execute_git(
                cancel,
                GitCommand::new(["remote", "get-url", self.remote.as_str()])
                    .in_dir(&ctx.repository.path),
            )
            .await;
        match result {
            Ok(output) if output.trimmed_stdout().is_empty() => {
                ctx.environment.report(
                    Event::warn(
                        codes::REMOTE_MISSING,
                        format!("remote {} has no URL", self.remote),
                    )
                    .for_repository(
                        ctx.repository.effective_owner_repo(),
                        ctx.repository.path.clone(),
                    )
                    .detail("remote", self.remote.clone()),
                );
                Err(ActionSkip::new(REASON_REMOTE_MISSING)
                    .field("remote", self.remote.clone())
                    .into())
            }
            Ok(_) => Ok(()),
            Err(GitError::CommandFailed { stderr, .. }) => {
                Err(ActionSkip::new(REASON_REMOTE_LOOKUP_FAILED)
                    .field("remote", self.remote.clone())
                    .field("error", stderr)
                    .into())
            }
            Err(other) => Err(other.into()),
        }
    }
}
