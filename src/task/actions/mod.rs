//! task::actions
//!
//! The guard/action framework and the concrete workflow steps.
//!
//! # Design
//!
//! Guards and actions share the same shape: an async check/execute
//! taking the cancellation token and the per-task
//! [`ExecutionContext`](crate::task::context::ExecutionContext). A step
//! that returns [`StepError::Skip`] signals "skip this task, do not
//! fail"; any other error fails the task.
//!
//! Concrete composites (`git.stage-commit`, `pull-request.open`) are
//! thin wrappers delegating to the simpler steps; there is no deep
//! hierarchy.

pub mod branch;
pub mod custom;
pub mod files;
pub mod git;
pub mod pull_request;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::errors::{ActionSkip, OperationError};
use crate::forge::ForgeError;
use crate::fsio::FsError;
use crate::git::GitError;
use crate::task::context::ExecutionContext;

pub use branch::BranchPrepare;
pub use custom::{CustomActionHandler, CustomTaskAction};
pub use files::FilesApply;
pub use git::{GitCommit, GitPush, GitStage, GitStageCommit};
pub use pull_request::{PullRequestCreate, PullRequestOpen};

/// Failure modes of a guard check or an action execution.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Skip the task; not a failure.
    #[error("skip: {0}")]
    Skip(ActionSkip),

    /// Fail the task.
    #[error(transparent)]
    Fail(OperationError),
}

impl StepError {
    /// Build a skip with a reason and no fields.
    pub fn skip(reason: impl Into<String>) -> Self {
        StepError::Skip(ActionSkip::new(reason))
    }
}

impl From<ActionSkip> for StepError {
    fn from(skip: ActionSkip) -> Self {
        StepError::Skip(skip)
    }
}

impl From<OperationError> for StepError {
    fn from(error: OperationError) -> Self {
        StepError::Fail(error)
    }
}

impl From<anyhow::Error> for StepError {
    fn from(error: anyhow::Error) -> Self {
        StepError::Fail(OperationError::Other(error))
    }
}

impl From<GitError> for StepError {
    fn from(error: GitError) -> Self {
        StepError::Fail(OperationError::Other(error.into()))
    }
}

impl From<FsError> for StepError {
    fn from(error: FsError) -> Self {
        StepError::Fail(OperationError::Other(error.into()))
    }
}

impl From<ForgeError> for StepError {
    fn from(error: ForgeError) -> Self {
        StepError::Fail(OperationError::Other(error.into()))
    }
}

/// Pre-condition evaluated before an action executes.
#[async_trait]
pub trait Guard: Send + Sync {
    /// Guard name for diagnostics.
    fn name(&self) -> &'static str;

    /// Check the pre-condition.
    async fn check(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError>;
}

/// An imperative unit run as part of a task.
#[async_trait]
pub trait Action: Send + Sync {
    /// Action name for diagnostics (`branch.prepare`, `git.push`, ...).
    fn name(&self) -> &str;

    /// Guards evaluated, in order, before the action runs.
    fn guards(&self) -> &[Arc<dyn Guard>];

    /// Run the action.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError>;
}
