//! forge::traits
//!
//! GitHub client capability set consumed by the engine.
//!
//! # Design
//!
//! The trait is async because forge operations involve network I/O.
//! Unlike a single-repository tool, the engine works across a fleet, so
//! every call names its target repository explicitly as `owner/name`.
//!
//! Host calls are invoked only after local work has succeeded; they may
//! fail without compromising local correctness.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The call was cancelled.
    #[error("forge call cancelled")]
    Cancelled,
}

/// Request to create a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePullRequest {
    /// Target repository as `owner/name`.
    pub repository: String,
    /// Head branch name (the branch with changes).
    pub head: String,
    /// Base branch name (the branch to merge into).
    pub base: String,
    /// PR title.
    pub title: String,
    /// PR body/description.
    pub body: String,
    /// Create as draft.
    pub draft: bool,
}

/// Pull request information returned from the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    /// PR number.
    pub number: u64,
    /// Web URL for viewing.
    pub url: String,
    /// Head branch name.
    pub head: String,
    /// Base branch name.
    pub base: String,
    /// Whether the PR is a draft.
    pub is_draft: bool,
}

/// Repository metadata resolved from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryMetadata {
    /// Full name as the host reports it (after redirects).
    pub full_name: String,
    /// Default branch on the host.
    pub default_branch: String,
}

/// The GitHub capability set.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the stage runner calls them
/// from concurrently running operations.
#[async_trait]
pub trait GithubClient: Send + Sync {
    /// Create a new pull request.
    ///
    /// # Errors
    ///
    /// - `AuthRequired`/`AuthFailed` when credentials are missing or bad
    /// - `ApiError` with status 422 when validation fails (e.g., a PR
    ///   for the head already exists)
    async fn create_pull_request(
        &self,
        cancel: &CancellationToken,
        request: CreatePullRequest,
    ) -> Result<PullRequestInfo, ForgeError>;

    /// Find an open pull request by head branch.
    ///
    /// Used for idempotent publication: link the existing PR instead of
    /// failing on a duplicate.
    async fn find_pull_request_by_head(
        &self,
        cancel: &CancellationToken,
        repository: &str,
        head: &str,
    ) -> Result<Option<PullRequestInfo>, ForgeError>;

    /// Resolve repository metadata (post-redirect name, default branch).
    async fn resolve_repository(
        &self,
        cancel: &CancellationToken,
        repository: &str,
    ) -> Result<RepositoryMetadata, ForgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forge_error_display() {
        assert_eq!(
            format!("{}", ForgeError::AuthRequired),
            "authentication required"
        );
        assert_eq!(
            format!("{}", ForgeError::NotFound("octo/widgets".into())),
            "not found: octo/widgets"
        );
        assert_eq!(format!("{}", ForgeError::RateLimited), "rate limited");
        assert_eq!(
            format!(
                "{}",
                ForgeError::ApiError {
                    status: 422,
                    message: "Validation failed".into()
                }
            ),
            "API error: 422 - Validation failed"
        );
    }
}
