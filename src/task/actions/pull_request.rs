//! task::actions::pull_request
//!
//! Pull-request publication.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::types::OwnerRepo;
use crate::engine::errors::ActionSkip;
use crate::forge::CreatePullRequest;
use crate::report::{codes, Event};
use crate::task::context::ExecutionContext;

use super::git::GitPush;
use super::{Action, Guard, StepError};

/// Skip reason when the repository owner cannot be determined.
pub const REASON_OWNER_MISSING: &str = "origin owner missing";

/// Create the pull request described by the plan.
///
/// Publication is idempotent: an open pull request with the same head
/// is linked instead of duplicated.
#[derive(Default)]
pub struct PullRequestCreate {
    guards: Vec<Arc<dyn Guard>>,
}

impl PullRequestCreate {
    /// Build the action.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Action for PullRequestCreate {
    fn name(&self) -> &str {
        "pull-request.create"
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        let Some(pr) = ctx.plan.pull_request.as_ref() else {
            return Ok(());
        };
        let github = ctx.environment.github().ok_or_else(|| {
            StepError::Fail(
                anyhow::anyhow!("github client required for pull-request creation").into(),
            )
        })?;

        let split = OwnerRepo::parse(ctx.repository.effective_owner_repo());
        if !split.has_owner() {
            ctx.environment.report(
                Event::warn(
                    codes::ORIGIN_OWNER_MISSING,
                    "cannot determine repository owner for pull request",
                )
                .for_repository(
                    ctx.repository.effective_owner_repo(),
                    ctx.repository.path.clone(),
                ),
            );
            return Err(ActionSkip::new(REASON_OWNER_MISSING).into());
        }
        let repository = split.full_name();

        if let Some(existing) = github
            .find_pull_request_by_head(cancel, &repository, &ctx.plan.branch)
            .await?
        {
            ctx.environment.report(
                Event::info(
                    codes::PULL_REQUEST_CREATED,
                    format!("pull request already open: {}", existing.url),
                )
                .for_repository(repository, ctx.repository.path.clone())
                .detail("number", existing.number.to_string())
                .detail("url", existing.url),
            );
            return Ok(());
        }

        let created = github
            .create_pull_request(
                cancel,
                CreatePullRequest {
                    repository: repository.clone(),
                    head: ctx.plan.branch.clone(),
                    base: pr.base.clone(),
                    title: pr.title.clone(),
                    body: pr.body.clone(),
                    draft: pr.draft,
                },
            )
            .await?;

        ctx.environment.report(
            Event::info(
                codes::PULL_REQUEST_CREATED,
                format!("opened pull request {}", created.url),
            )
            .for_repository(repository, ctx.repository.path.clone())
            .detail("number", created.number.to_string())
            .detail("url", created.url),
        );
        Ok(())
    }
}

/// Composed push + pull-request creation.
pub struct PullRequestOpen {
    push: GitPush,
    create: PullRequestCreate,
    guards: Vec<Arc<dyn Guard>>,
}

impl PullRequestOpen {
    /// Build the composite with its guards (remote-configured).
    pub fn new(guards: Vec<Arc<dyn Guard>>) -> Self {
        Self {
            push: GitPush::new(Vec::new()),
            create: PullRequestCreate::new(),
            guards,
        }
    }
}

#[async_trait]
impl Action for PullRequestOpen {
    fn name(&self) -> &str {
        "pull-request.open"
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        self.push.execute(cancel, ctx).await?;
        self.create.execute(cancel, ctx).await
    }
}
