//! git::mock
//!
//! Scripted Git executor for deterministic testing.
//!
//! # Design
//!
//! The mock matches invocations by their joined argument string and
//! replays a configured response. Unscripted calls succeed with empty
//! output, so tests only script what they assert on. Every call is
//! recorded for verification.
//!
//! # Example
//!
//! ```
//! use gitfleet::git::{GitCommand, GitExecutor, MockGit};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let git = MockGit::new();
//! git.respond("rev-parse --abbrev-ref HEAD", "main\n");
//!
//! let output = git
//!     .execute_git(
//!         &CancellationToken::new(),
//!         GitCommand::new(["rev-parse", "--abbrev-ref", "HEAD"]),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(output.stdout, "main\n");
//! assert_eq!(git.calls(), vec!["rev-parse --abbrev-ref HEAD"]);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::interface::{GitCommand, GitError, GitExecutor, GitOutput};

#[derive(Debug, Default)]
struct MockGitInner {
    responses: HashMap<String, Result<String, GitError>>,
    calls: Vec<String>,
}

/// Scripted Git executor.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct MockGit {
    inner: Arc<Mutex<MockGitInner>>,
}

impl MockGit {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful response for a joined argument string.
    pub fn respond(&self, args: &str, stdout: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .responses
            .insert(args.to_string(), Ok(stdout.to_string()));
    }

    /// Script a failure for a joined argument string.
    pub fn fail(&self, args: &str, error: GitError) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.responses.insert(args.to_string(), Err(error));
    }

    /// Joined argument strings of every call so far, in order.
    pub fn calls(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.calls.clone()
    }

    /// Number of calls whose joined arguments start with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl GitExecutor for MockGit {
    async fn execute_git(
        &self,
        cancel: &CancellationToken,
        command: GitCommand,
    ) -> Result<GitOutput, GitError> {
        if cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        let key = command.arguments.join(" ");
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.calls.push(key.clone());

        match inner.responses.get(&key) {
            Some(Ok(stdout)) => Ok(GitOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
                exit_code: 0,
            }),
            Some(Err(error)) => Err(error.clone()),
            None => Ok(GitOutput::default()),
        }
    }
}
