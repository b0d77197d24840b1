//! task::template
//!
//! Template rendering for task planning.
//!
//! # Design
//!
//! Branch names, start points, commit messages, file paths and
//! contents, and pull-request fields are all templates rendered per
//! repository. The template data exposes the task, the repository
//! metadata, and the currently visible workflow variables:
//!
//! ```text
//! {{ task.name }}
//! {{ repository.default_branch }}
//! {{ env.workflow_run_id }}
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::core::state::RepositoryState;
use crate::core::task::TaskDefinition;
use crate::core::types::OwnerRepo;

/// Default template for branch start points and pull-request bases.
pub const DEFAULT_BRANCH_TEMPLATE: &str = "{{ repository.default_branch }}";

/// Errors from template rendering.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template failed to parse or render.
    #[error("template {context:?} failed: {source}")]
    Render {
        /// Which template failed (e.g. `branch.name`).
        context: String,
        /// Underlying engine error.
        #[source]
        source: minijinja::Error,
    },
}

/// Task half of the template data.
#[derive(Debug, Clone, Serialize)]
pub struct TaskData {
    /// Task name.
    pub name: String,
}

/// Repository half of the template data.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryData {
    /// Repository path.
    pub path: String,
    /// Owner (may be empty).
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Full `owner/name`.
    pub full_name: String,
    /// Default branch on the remote.
    pub default_branch: String,
    /// Path depth.
    pub depth: usize,
    /// Worktree was clean at run start.
    pub initial_clean: bool,
    /// Another repository nests beneath this one.
    pub has_nested: bool,
}

/// Data visible to every task template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    /// The task being planned.
    pub task: TaskData,
    /// The repository being planned against.
    pub repository: RepositoryData,
    /// Currently visible workflow variables.
    pub env: BTreeMap<String, String>,
}

impl TemplateData {
    /// Assemble template data for one (task, repository) pair.
    pub fn new(
        task: &TaskDefinition,
        repository: &RepositoryState,
        variables: BTreeMap<String, String>,
    ) -> Self {
        let split = OwnerRepo::parse(repository.effective_owner_repo());
        Self {
            task: TaskData {
                name: task.name.clone(),
            },
            repository: RepositoryData {
                path: repository.path.display().to_string(),
                owner: split.owner,
                name: split.name,
                full_name: repository.effective_owner_repo().to_string(),
                default_branch: repository.remote_default_branch.clone(),
                depth: repository.depth,
                initial_clean: repository.initial_clean_worktree,
                has_nested: repository.has_nested_repositories,
            },
            env: variables,
        }
    }
}

/// Render one template against the data.
///
/// `context` names the template in errors (`branch.name`,
/// `files[0].path`, ...).
pub fn render(context: &str, template: &str, data: &TemplateData) -> Result<String, TemplateError> {
    if !template.contains("{{") && !template.contains("{%") {
        // Fast path for literal strings.
        return Ok(template.to_string());
    }
    let environment = minijinja::Environment::new();
    environment
        .render_str(template, data)
        .map_err(|source| TemplateError::Render {
            context: context.to_string(),
            source,
        })
}
