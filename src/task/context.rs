//! task::context
//!
//! Per-(repository, task) working memory for guards and actions.
//!
//! # Design
//!
//! The [`ExecutionContext`] carries only per-task state: the memoized
//! worktree check, ignored-dirty patterns, the original branch for
//! restoration, progress flags, and skip bookkeeping. It is constructed
//! per (repository, task) pair and discarded at the task boundary.
//!
//! Skip warnings are deduplicated against a key composed of the trimmed
//! message and sorted `field=value` pairs: a repeated identical skip is
//! recorded for state but does not warn again.

use crate::core::state::RepositoryState;
use crate::engine::environment::Environment;
use crate::engine::errors::ActionSkip;

use super::planner::TaskPlan;

/// Memoized result of a clean-worktree probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeCheck {
    /// True when no dirty entries remained after filtering.
    pub clean: bool,
    /// Dirty entries kept for messaging (empty when clean).
    pub entries: Vec<String>,
}

/// Per-(repository, task) execution state.
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    /// Shared collaborators.
    pub environment: &'a Environment,
    /// The repository under execution.
    pub repository: &'a RepositoryState,
    /// The plan being executed.
    pub plan: &'a TaskPlan,
    /// Effective clean-worktree requirement (after variable override).
    pub require_clean: bool,
    /// Status substrings that do not count as dirty.
    pub ignored_dirty_patterns: Vec<String>,
    /// Branch checked out before the task started.
    pub original_branch: Option<String>,
    /// The task branch was prepared.
    pub branch_prepared: bool,
    /// File changes were written.
    pub files_applied: bool,
    /// Count of custom actions that ran.
    pub custom_actions_run: usize,
    worktree: Option<WorktreeCheck>,
    skip_requested: Option<ActionSkip>,
    last_skip_warning: Option<String>,
}

impl<'a> ExecutionContext<'a> {
    /// Build a context for one (repository, task) pair.
    pub fn new(
        environment: &'a Environment,
        repository: &'a RepositoryState,
        plan: &'a TaskPlan,
        require_clean: bool,
        ignored_dirty_patterns: Vec<String>,
    ) -> Self {
        Self {
            environment,
            repository,
            plan,
            require_clean,
            ignored_dirty_patterns,
            original_branch: None,
            branch_prepared: false,
            files_applied: false,
            custom_actions_run: 0,
            worktree: None,
            skip_requested: None,
            last_skip_warning: None,
        }
    }

    /// The memoized worktree check, when one ran.
    pub fn worktree_check(&self) -> Option<&WorktreeCheck> {
        self.worktree.as_ref()
    }

    /// Memoize a worktree check result.
    ///
    /// A clean result observed once is not re-queried; a dirty result
    /// keeps its entry list for messaging.
    pub fn store_worktree_check(&mut self, clean: bool, entries: Vec<String>) {
        self.worktree = Some(WorktreeCheck { clean, entries });
    }

    /// Record that a guard or action requested a skip.
    pub fn request_skip(&mut self, skip: ActionSkip) {
        self.skip_requested = Some(skip);
    }

    /// The requested skip, if any.
    pub fn skip_requested(&self) -> Option<&ActionSkip> {
        self.skip_requested.as_ref()
    }

    /// Decide whether this skip warrants a warning event.
    ///
    /// Returns `false` for a repeat of the previous warning key.
    pub fn should_warn_skip(&mut self, skip: &ActionSkip) -> bool {
        let key = skip.dedup_key();
        if self.last_skip_warning.as_deref() == Some(key.as_str()) {
            false
        } else {
            self.last_skip_warning = Some(key);
            true
        }
    }
}
