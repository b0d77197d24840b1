//! forge::github
//!
//! GitHub client implementation over the REST API.
//!
//! # Authentication
//!
//! All API calls require a token with `repo` scope (private
//! repositories) or `public_repo` (public ones).
//!
//! # Rate Limiting
//!
//! Returns [`ForgeError::RateLimited`] when limits are hit; retrying is
//! the caller's responsibility.
//!
//! # Example
//!
//! ```ignore
//! use gitfleet::forge::{CreatePullRequest, GithubClient, GithubHttp};
//! use tokio_util::sync::CancellationToken;
//!
//! let github = GithubHttp::new("ghp_token123");
//! let pr = github
//!     .create_pull_request(&CancellationToken::new(), CreatePullRequest {
//!         repository: "octo/widgets".to_string(),
//!         head: "automation/sync-ci".to_string(),
//!         base: "main".to_string(),
//!         title: "Sync CI".to_string(),
//!         body: String::new(),
//!         draft: false,
//!     })
//!     .await?;
//! println!("opened {}", pr.url);
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::traits::{
    CreatePullRequest, ForgeError, GithubClient, PullRequestInfo, RepositoryMetadata,
};

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "gitfleet";

/// GitHub client over the REST API.
#[derive(Debug, Clone)]
pub struct GithubHttp {
    client: Client,
    token: String,
    /// API base URL (configurable for GitHub Enterprise).
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
    draft: Option<bool>,
    head: RefResponse,
    base: RefResponse,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    full_name: String,
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl GithubHttp {
    /// Create a client for api.github.com.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Create a client with a custom API base URL (GitHub Enterprise).
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: api_base.into(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|_| ForgeError::AuthFailed("token contains invalid bytes".into()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    fn repo_url(&self, repository: &str, path: &str) -> String {
        if path.is_empty() {
            format!("{}/repos/{}", self.api_base, repository)
        } else {
            format!("{}/repos/{}/{}", self.api_base, repository, path)
        }
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {e}"),
            });
        }

        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.to_string());

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed(message),
            StatusCode::FORBIDDEN if message.to_lowercase().contains("rate limit") => {
                ForgeError::RateLimited
            }
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(message),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        cancel: &CancellationToken,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ForgeError> {
        if cancel.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ForgeError::Cancelled),
            result = request.send() => {
                result.map_err(|e| ForgeError::NetworkError(e.to_string()))?
            }
        };
        self.handle_response(response).await
    }
}

impl From<PullResponse> for PullRequestInfo {
    fn from(pull: PullResponse) -> Self {
        Self {
            number: pull.number,
            url: pull.html_url,
            head: pull.head.name,
            base: pull.base.name,
            is_draft: pull.draft.unwrap_or(false),
        }
    }
}

#[async_trait]
impl GithubClient for GithubHttp {
    async fn create_pull_request(
        &self,
        cancel: &CancellationToken,
        request: CreatePullRequest,
    ) -> Result<PullRequestInfo, ForgeError> {
        let url = self.repo_url(&request.repository, "pulls");
        let body = serde_json::json!({
            "title": request.title,
            "head": request.head,
            "base": request.base,
            "body": request.body,
            "draft": request.draft,
        });
        let pull: PullResponse = self
            .send(
                cancel,
                self.client.post(url).headers(self.headers()?).json(&body),
            )
            .await?;
        Ok(pull.into())
    }

    async fn find_pull_request_by_head(
        &self,
        cancel: &CancellationToken,
        repository: &str,
        head: &str,
    ) -> Result<Option<PullRequestInfo>, ForgeError> {
        let owner = repository.split('/').next().unwrap_or_default();
        let url = self.repo_url(repository, "pulls");
        let pulls: Vec<PullResponse> = self
            .send(
                cancel,
                self.client
                    .get(url)
                    .headers(self.headers()?)
                    .query(&[("head", format!("{owner}:{head}")), ("state", "open".into())]),
            )
            .await?;
        Ok(pulls.into_iter().next().map(Into::into))
    }

    async fn resolve_repository(
        &self,
        cancel: &CancellationToken,
        repository: &str,
    ) -> Result<RepositoryMetadata, ForgeError> {
        let url = self.repo_url(repository, "");
        let repo: RepoResponse = self
            .send(cancel, self.client.get(url).headers(self.headers()?))
            .await?;
        Ok(RepositoryMetadata {
            full_name: repo.full_name,
            default_branch: repo.default_branch,
        })
    }
}
