//! git
//!
//! The single doorway to Git: the executor interface, repository-level
//! porcelain, and a scripted mock for tests.

pub mod interface;
pub mod manager;
pub mod mock;

pub use interface::{GitCommand, GitError, GitExecutor, GitOutput, SystemGitExecutor};
pub use manager::{
    is_inside_work_tree, RepositoryDiscoverer, RepositoryManager, ShellRepositoryManager,
};
pub use mock::MockGit;
