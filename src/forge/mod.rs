//! forge
//!
//! Abstraction for the GitHub host: the capability trait, an HTTP
//! implementation, and a recording mock.

pub mod github;
pub mod mock;
pub mod traits;

pub use github::GithubHttp;
pub use mock::{FailOn, MockGithub};
pub use traits::{
    CreatePullRequest, ForgeError, GithubClient, PullRequestInfo, RepositoryMetadata,
};
