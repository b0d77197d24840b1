//! forge::mock
//!
//! Mock GitHub client for deterministic testing.
//!
//! # Design
//!
//! The mock stores pull requests in memory, allows configuring failure
//! scenarios, and records every operation for verification.
//!
//! # Example
//!
//! ```
//! use gitfleet::forge::{CreatePullRequest, GithubClient, MockGithub};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let github = MockGithub::new();
//! let pr = github
//!     .create_pull_request(&CancellationToken::new(), CreatePullRequest {
//!         repository: "octo/widgets".to_string(),
//!         head: "automation/x".to_string(),
//!         base: "main".to_string(),
//!         title: "X".to_string(),
//!         body: String::new(),
//!         draft: false,
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(pr.number, 1);
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::traits::{
    CreatePullRequest, ForgeError, GithubClient, PullRequestInfo, RepositoryMetadata,
};

/// Which operation should fail, and how.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail create_pull_request with the given error.
    CreatePullRequest(ForgeError),
    /// Fail find_pull_request_by_head with the given error.
    FindPullRequestByHead(ForgeError),
    /// Fail resolve_repository with the given error.
    ResolveRepository(ForgeError),
}

#[derive(Debug, Default)]
struct MockGithubInner {
    pulls: Vec<(String, PullRequestInfo)>,
    next_number: u64,
    metadata: BTreeMap<String, RepositoryMetadata>,
    fail_on: Option<FailOn>,
    created: Vec<CreatePullRequest>,
}

/// Mock GitHub client.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share
/// state.
#[derive(Debug, Clone)]
pub struct MockGithub {
    inner: Arc<Mutex<MockGithubInner>>,
}

impl Default for MockGithub {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGithub {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockGithubInner {
                pulls: Vec::new(),
                next_number: 1,
                metadata: BTreeMap::new(),
                fail_on: None,
                created: Vec::new(),
            })),
        }
    }

    /// Configure a failure scenario.
    pub fn fail_on(&self, fail: FailOn) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fail_on = Some(fail);
    }

    /// Register repository metadata for `resolve_repository`.
    pub fn register_repository(&self, repository: &str, metadata: RepositoryMetadata) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.metadata.insert(repository.to_string(), metadata);
    }

    /// Requests passed to `create_pull_request` so far.
    pub fn created_pull_requests(&self) -> Vec<CreatePullRequest> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.created.clone()
    }
}

#[async_trait]
impl GithubClient for MockGithub {
    async fn create_pull_request(
        &self,
        cancel: &CancellationToken,
        request: CreatePullRequest,
    ) -> Result<PullRequestInfo, ForgeError> {
        if cancel.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(FailOn::CreatePullRequest(err)) = &inner.fail_on {
            return Err(err.clone());
        }
        let number = inner.next_number;
        inner.next_number += 1;
        let pr = PullRequestInfo {
            number,
            url: format!("https://github.com/{}/pull/{number}", request.repository),
            head: request.head.clone(),
            base: request.base.clone(),
            is_draft: request.draft,
        };
        inner.pulls.push((request.repository.clone(), pr.clone()));
        inner.created.push(request);
        Ok(pr)
    }

    async fn find_pull_request_by_head(
        &self,
        cancel: &CancellationToken,
        repository: &str,
        head: &str,
    ) -> Result<Option<PullRequestInfo>, ForgeError> {
        if cancel.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(FailOn::FindPullRequestByHead(err)) = &inner.fail_on {
            return Err(err.clone());
        }
        Ok(inner
            .pulls
            .iter()
            .find(|(repo, pr)| repo == repository && pr.head == head)
            .map(|(_, pr)| pr.clone()))
    }

    async fn resolve_repository(
        &self,
        cancel: &CancellationToken,
        repository: &str,
    ) -> Result<RepositoryMetadata, ForgeError> {
        if cancel.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(FailOn::ResolveRepository(err)) = &inner.fail_on {
            return Err(err.clone());
        }
        inner
            .metadata
            .get(repository)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(repository.to_string()))
    }
}
