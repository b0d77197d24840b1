//! git::interface
//!
//! The Git executor interface and its subprocess-backed implementation.
//!
//! # Architecture
//!
//! All Git interactions flow through the [`GitExecutor`] trait, which
//! provides structured results and normalizes failures into typed error
//! categories. The engine never shells out on its own; the single
//! doorway keeps error handling consistent and makes every call
//! mockable.
//!
//! # Error Handling
//!
//! A command that runs but exits non-zero becomes
//! [`GitError::CommandFailed`], carrying the exit code and stderr so
//! guard logic can distinguish "ref does not exist" from "git is
//! broken". Spawn failures and cancellation get their own variants.
//!
//! # Example
//!
//! ```ignore
//! use gitfleet::git::{GitCommand, GitExecutor, SystemGitExecutor};
//! use tokio_util::sync::CancellationToken;
//!
//! let git = SystemGitExecutor::new();
//! let output = git
//!     .execute_git(
//!         &CancellationToken::new(),
//!         GitCommand::new(["status", "--porcelain"]).in_dir("/work/repo"),
//!     )
//!     .await?;
//! println!("{}", output.stdout);
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from Git execution.
#[derive(Debug, Clone, Error)]
pub enum GitError {
    /// The command ran and exited non-zero.
    #[error("git {args:?} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        /// Arguments passed to git.
        args: Vec<String>,
        /// Process exit code.
        exit_code: i32,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// The git binary could not be spawned.
    #[error("failed to launch git: {message}")]
    LaunchFailed {
        /// Description of the spawn failure.
        message: String,
    },

    /// The run was cancelled before or during the call.
    #[error("git call cancelled")]
    Cancelled,

    /// Output was not valid UTF-8.
    #[error("git produced non-UTF-8 output")]
    InvalidOutput,
}

impl GitError {
    /// Exit code for command failures, if this error carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            GitError::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// A single Git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitCommand {
    /// Arguments, excluding the `git` binary itself.
    pub arguments: Vec<String>,
    /// Working directory. Empty means the process working directory.
    pub working_directory: Option<PathBuf>,
    /// Extra environment variables for the child process.
    pub environment: BTreeMap<String, String>,
}

impl GitCommand {
    /// Build a command from arguments.
    pub fn new<I, S>(arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            arguments: arguments.into_iter().map(Into::into).collect(),
            working_directory: None,
            environment: BTreeMap::new(),
        }
    }

    /// Run the command inside `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Add an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

/// Result of a successful Git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Process exit code (zero for success results).
    pub exit_code: i32,
}

impl GitOutput {
    /// Stdout with trailing whitespace removed.
    pub fn trimmed_stdout(&self) -> &str {
        self.stdout.trim_end()
    }
}

/// Capability set for running Git commands.
///
/// Implementations must be `Send + Sync`; the stage runner calls them
/// from concurrently running operations.
#[async_trait]
pub trait GitExecutor: Send + Sync {
    /// Run a Git command to completion.
    ///
    /// # Errors
    ///
    /// - `CommandFailed` when git exits non-zero
    /// - `LaunchFailed` when the binary cannot be spawned
    /// - `Cancelled` when the token fires first
    async fn execute_git(
        &self,
        cancel: &CancellationToken,
        command: GitCommand,
    ) -> Result<GitOutput, GitError>;
}

/// Subprocess-backed executor using the system `git` binary.
#[derive(Debug, Clone, Default)]
pub struct SystemGitExecutor {
    binary: Option<PathBuf>,
}

impl SystemGitExecutor {
    /// Use `git` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit git binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }
}

#[async_trait]
impl GitExecutor for SystemGitExecutor {
    async fn execute_git(
        &self,
        cancel: &CancellationToken,
        command: GitCommand,
    ) -> Result<GitOutput, GitError> {
        if cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        let binary = self
            .binary
            .clone()
            .unwrap_or_else(|| PathBuf::from("git"));
        let mut child = tokio::process::Command::new(binary);
        child
            .args(&command.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_directory {
            child.current_dir(dir);
        }
        for (key, value) in &command.environment {
            child.env(key, value);
        }

        let waiting = child.output();
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(GitError::Cancelled),
            result = waiting => result.map_err(|err| GitError::LaunchFailed {
                message: err.to_string(),
            })?,
        };

        let stdout = String::from_utf8(output.stdout).map_err(|_| GitError::InvalidOutput)?;
        let stderr = String::from_utf8(output.stderr).map_err(|_| GitError::InvalidOutput)?;
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                args: command.arguments,
                exit_code,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(GitOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod command_builder {
        use super::*;

        #[test]
        fn collects_arguments() {
            let cmd = GitCommand::new(["status", "--porcelain"]);
            assert_eq!(cmd.arguments, vec!["status", "--porcelain"]);
            assert!(cmd.working_directory.is_none());
        }

        #[test]
        fn sets_dir_and_env() {
            let cmd = GitCommand::new(["fetch"])
                .in_dir("/work/repo")
                .env("GIT_TERMINAL_PROMPT", "0");
            assert_eq!(cmd.working_directory, Some(PathBuf::from("/work/repo")));
            assert_eq!(
                cmd.environment.get("GIT_TERMINAL_PROMPT"),
                Some(&"0".to_string())
            );
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn exit_code_only_for_command_failures() {
            let failed = GitError::CommandFailed {
                args: vec!["rev-parse".into()],
                exit_code: 128,
                stderr: "fatal".into(),
            };
            assert_eq!(failed.exit_code(), Some(128));
            assert_eq!(GitError::Cancelled.exit_code(), None);
        }

        #[test]
        fn display_includes_stderr() {
            let failed = GitError::CommandFailed {
                args: vec!["push".into()],
                exit_code: 1,
                stderr: "rejected".into(),
            };
            let text = failed.to_string();
            assert!(text.contains("rejected"));
            assert!(text.contains('1'));
        }
    }

    mod system_executor {
        use super::*;

        #[tokio::test]
        async fn runs_version() {
            let git = SystemGitExecutor::new();
            let output = git
                .execute_git(&CancellationToken::new(), GitCommand::new(["--version"]))
                .await
                .expect("git --version should succeed");
            assert!(output.stdout.contains("git version"));
            assert_eq!(output.exit_code, 0);
        }

        #[tokio::test]
        async fn nonzero_exit_is_command_failed() {
            let git = SystemGitExecutor::new();
            let dir = tempfile::tempdir().unwrap();
            let err = git
                .execute_git(
                    &CancellationToken::new(),
                    GitCommand::new(["rev-parse", "--verify", "nope"]).in_dir(dir.path()),
                )
                .await
                .expect_err("rev-parse outside a repo must fail");
            assert!(matches!(err, GitError::CommandFailed { .. }));
        }

        #[tokio::test]
        async fn cancelled_token_short_circuits() {
            let git = SystemGitExecutor::new();
            let cancel = CancellationToken::new();
            cancel.cancel();
            let err = git
                .execute_git(&cancel, GitCommand::new(["--version"]))
                .await
                .expect_err("cancelled call must fail");
            assert!(matches!(err, GitError::Cancelled));
        }

        #[tokio::test]
        async fn missing_binary_is_launch_failed() {
            let git = SystemGitExecutor::with_binary("/nonexistent/git-binary");
            let err = git
                .execute_git(&CancellationToken::new(), GitCommand::new(["--version"]))
                .await
                .expect_err("missing binary must fail");
            assert!(matches!(err, GitError::LaunchFailed { .. }));
        }
    }
}
