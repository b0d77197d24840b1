//! core::task
//!
//! Declarative task definitions.
//!
//! # Design
//!
//! A [`TaskDefinition`] describes repository work declaratively: which
//! branch to work on, which files to write, which actions to run, and
//! how to commit and publish the result. Definitions are pure data;
//! loading them from YAML/JSON files is the caller's concern. All
//! user-facing strings are templates rendered per repository by the task
//! planner.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a file entry interacts with existing on-disk content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExistenceMode {
    /// Replace the file contents unconditionally.
    #[default]
    Overwrite,
    /// Leave the file alone when it already exists.
    SkipIfExists,
    /// Append desired lines that are not already present.
    AppendIfMissing,
    /// Ensure desired lines are present, preserving everything else.
    LineEdit,
}

/// A file the task wants to exist with particular content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Relative path template.
    pub path: String,
    /// Content template.
    #[serde(default)]
    pub content: String,
    /// Existence handling mode.
    #[serde(default)]
    pub mode: ExistenceMode,
    /// Unix permission bits applied on write.
    #[serde(default)]
    pub permissions: Option<u32>,
}

/// Branch work for a task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BranchSpec {
    /// Branch name template. Falls back to `automation/<task name>`.
    #[serde(default)]
    pub name: String,
    /// Start point template. Falls back to the repository default branch.
    #[serde(default)]
    pub start_point: String,
    /// Remote used by push and pull-request actions. Empty disables both.
    #[serde(default)]
    pub push_remote: String,
}

/// Commit behavior.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitSpec {
    /// Commit message template. Falls back to `Apply task <task name>`.
    #[serde(default)]
    pub message: String,
    /// Pass `--allow-empty` to `git commit`.
    #[serde(default)]
    pub allow_empty: bool,
}

/// Pull-request publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSpec {
    /// Title template. Must render non-empty.
    pub title: String,
    /// Body template.
    #[serde(default)]
    pub body: String,
    /// Base branch template. Falls back to the repository default branch.
    #[serde(default)]
    pub base: String,
    /// Open the pull request as a draft.
    #[serde(default)]
    pub draft: bool,
}

/// A custom action invocation.
///
/// Option values stay opaque to the engine: string values are rendered
/// as templates, everything else passes through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Handler type, dispatched as `task.action.<type>`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Handler options.
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Safety switches applied while executing a task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Safeguards {
    /// Status entries matching any of these substrings do not count as
    /// dirty for the clean-worktree guard.
    #[serde(default)]
    pub ignored_dirty_patterns: Vec<String>,
    /// Skip the task entirely when the task branch already exists.
    #[serde(default)]
    pub skip_if_branch_exists: bool,
}

/// Declarative description of a repository task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Task name, used in events and fallbacks.
    pub name: String,
    /// Require a clean worktree before mutating.
    #[serde(default)]
    pub ensure_clean: bool,
    /// Variable that may override `ensure_clean` at execution time.
    #[serde(default)]
    pub ensure_clean_variable: String,
    /// Branch work.
    #[serde(default)]
    pub branch: BranchSpec,
    /// Files to write.
    #[serde(default)]
    pub files: Vec<FileSpec>,
    /// Custom actions to run after file work.
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    /// Commit behavior.
    #[serde(default)]
    pub commit: CommitSpec,
    /// Optional pull-request publication.
    #[serde(default)]
    pub pull_request: Option<PullRequestSpec>,
    /// Safety switches.
    #[serde(default)]
    pub safeguards: Safeguards,
}

impl TaskDefinition {
    /// A minimal task with the given name and library defaults.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ensure_clean: false,
            ensure_clean_variable: String::new(),
            branch: BranchSpec::default(),
            files: Vec::new(),
            actions: Vec::new(),
            commit: CommitSpec::default(),
            pull_request: None,
            safeguards: Safeguards::default(),
        }
    }
}
