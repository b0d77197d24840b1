//! git::manager
//!
//! Repository-level porcelain over the Git executor.
//!
//! # Design
//!
//! [`RepositoryManager`] is the capability set actions and guards need:
//! worktree status, branch queries, checkout, and remote lookup. The
//! shell-backed implementation composes onto any [`GitExecutor`], so a
//! test can swap in a scripted executor and exercise the manager's
//! parsing for free.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::interface::{GitCommand, GitError, GitExecutor};

/// Repository-level Git operations consumed by guards and actions.
#[async_trait]
pub trait RepositoryManager: Send + Sync {
    /// Porcelain status entries; empty means clean.
    async fn check_clean_worktree(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
    ) -> Result<Vec<String>, GitError>;

    /// Name of the currently checked-out branch.
    async fn current_branch(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
    ) -> Result<String, GitError>;

    /// URL configured for a remote; `CommandFailed` when unset.
    async fn remote_url(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
        remote: &str,
    ) -> Result<String, GitError>;

    /// Check out an existing branch.
    async fn checkout_branch(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
        branch: &str,
    ) -> Result<(), GitError>;

    /// Create or reset a branch, optionally from a start point.
    async fn create_branch(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
        branch: &str,
        start_point: Option<&str>,
    ) -> Result<(), GitError>;

    /// True when the branch resolves via `rev-parse --verify`.
    async fn branch_exists(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
        branch: &str,
    ) -> Result<bool, GitError>;
}

/// Filesystem discovery of repositories beneath the given roots.
#[async_trait]
pub trait RepositoryDiscoverer: Send + Sync {
    /// Paths of version-controlled repositories under `roots`.
    async fn discover_repositories(
        &self,
        cancel: &CancellationToken,
        roots: &[PathBuf],
    ) -> Result<Vec<PathBuf>, GitError>;
}

/// Shell-backed repository manager over any [`GitExecutor`].
#[derive(Clone)]
pub struct ShellRepositoryManager {
    git: Arc<dyn GitExecutor>,
}

impl ShellRepositoryManager {
    /// Wrap a Git executor.
    pub fn new(git: Arc<dyn GitExecutor>) -> Self {
        Self { git }
    }
}

impl std::fmt::Debug for ShellRepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellRepositoryManager").finish_non_exhaustive()
    }
}

#[async_trait]
impl RepositoryManager for ShellRepositoryManager {
    async fn check_clean_worktree(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
    ) -> Result<Vec<String>, GitError> {
        let output = self
            .git
            .execute_git(cancel, GitCommand::new(["status", "--porcelain"]).in_dir(repo))
            .await?;
        Ok(output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn current_branch(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
    ) -> Result<String, GitError> {
        let output = self
            .git
            .execute_git(
                cancel,
                GitCommand::new(["rev-parse", "--abbrev-ref", "HEAD"]).in_dir(repo),
            )
            .await?;
        Ok(output.trimmed_stdout().to_string())
    }

    async fn remote_url(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
        remote: &str,
    ) -> Result<String, GitError> {
        let output = self
            .git
            .execute_git(
                cancel,
                GitCommand::new(["remote", "get-url", remote]).in_dir(repo),
            )
            .await?;
        Ok(output.trimmed_stdout().to_string())
    }

    async fn checkout_branch(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
        branch: &str,
    ) -> Result<(), GitError> {
        self.git
            .execute_git(cancel, GitCommand::new(["checkout", branch]).in_dir(repo))
            .await?;
        Ok(())
    }

    async fn create_branch(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
        branch: &str,
        start_point: Option<&str>,
    ) -> Result<(), GitError> {
        let mut args = vec!["checkout".to_string(), "-B".to_string(), branch.to_string()];
        if let Some(start) = start_point {
            args.push(start.to_string());
        }
        self.git
            .execute_git(cancel, GitCommand::new(args).in_dir(repo))
            .await?;
        Ok(())
    }

    async fn branch_exists(
        &self,
        cancel: &CancellationToken,
        repo: &Path,
        branch: &str,
    ) -> Result<bool, GitError> {
        let probe = format!("refs/heads/{branch}");
        match self
            .git
            .execute_git(
                cancel,
                GitCommand::new(["rev-parse", "--verify", "--quiet", &probe]).in_dir(repo),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(GitError::CommandFailed { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }
}

/// Probe whether a path is inside a Git work tree.
///
/// Used to supplement discovery when a root itself is a repository the
/// discoverer did not report.
pub async fn is_inside_work_tree(
    git: &dyn GitExecutor,
    cancel: &CancellationToken,
    path: &Path,
) -> bool {
    match git
        .execute_git(
            cancel,
            GitCommand::new(["rev-parse", "--is-inside-work-tree"]).in_dir(path),
        )
        .await
    {
        Ok(output) => output.trimmed_stdout() == "true",
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::MockGit;

    fn manager(git: &MockGit) -> ShellRepositoryManager {
        ShellRepositoryManager::new(Arc::new(git.clone()))
    }

    #[tokio::test]
    async fn clean_worktree_splits_status_lines() {
        let git = MockGit::new();
        git.respond("status --porcelain", " M README.md\n?? notes.txt\n");
        let entries = manager(&git)
            .check_clean_worktree(&CancellationToken::new(), Path::new("/repo"))
            .await
            .unwrap();
        assert_eq!(entries, vec![" M README.md", "?? notes.txt"]);
    }

    #[tokio::test]
    async fn empty_status_is_clean() {
        let git = MockGit::new();
        git.respond("status --porcelain", "");
        let entries = manager(&git)
            .check_clean_worktree(&CancellationToken::new(), Path::new("/repo"))
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn current_branch_trims_newline() {
        let git = MockGit::new();
        git.respond("rev-parse --abbrev-ref HEAD", "main\n");
        let branch = manager(&git)
            .current_branch(&CancellationToken::new(), Path::new("/repo"))
            .await
            .unwrap();
        assert_eq!(branch, "main");
    }

    #[tokio::test]
    async fn branch_exists_maps_failure_to_false() {
        let git = MockGit::new();
        git.fail(
            "rev-parse --verify --quiet refs/heads/absent",
            GitError::CommandFailed {
                args: vec!["rev-parse".into()],
                exit_code: 1,
                stderr: String::new(),
            },
        );
        git.respond("rev-parse --verify --quiet refs/heads/present", "abc123\n");

        let mgr = manager(&git);
        let cancel = CancellationToken::new();
        assert!(!mgr
            .branch_exists(&cancel, Path::new("/repo"), "absent")
            .await
            .unwrap());
        assert!(mgr
            .branch_exists(&cancel, Path::new("/repo"), "present")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn create_branch_uses_checkout_dash_b() {
        let git = MockGit::new();
        git.respond("checkout -B automation/x main", "");
        manager(&git)
            .create_branch(
                &CancellationToken::new(),
                Path::new("/repo"),
                "automation/x",
                Some("main"),
            )
            .await
            .unwrap();
        assert!(git
            .calls()
            .iter()
            .any(|call| call == "checkout -B automation/x main"));
    }

    #[tokio::test]
    async fn work_tree_probe_checks_stdout() {
        let git = MockGit::new();
        git.respond("rev-parse --is-inside-work-tree", "true\n");
        assert!(is_inside_work_tree(&git, &CancellationToken::new(), Path::new("/repo")).await);

        let outside = MockGit::new();
        outside.fail(
            "rev-parse --is-inside-work-tree",
            GitError::CommandFailed {
                args: vec!["rev-parse".into()],
                exit_code: 128,
                stderr: "fatal: not a git repository".into(),
            },
        );
        assert!(
            !is_inside_work_tree(&outside, &CancellationToken::new(), Path::new("/tmp")).await
        );
    }
}
