//! task::planner
//!
//! Plans a task definition against a repository.
//!
//! # Architecture
//!
//! Planning renders every template, decides per file whether a change
//! applies, normalizes action options, and assembles the ordered
//! workflow steps the task executor will run. Plans are pure data plus
//! the concrete action objects; planning reads the filesystem but
//! mutates nothing.
//!
//! # Invariants
//!
//! - File changes are sorted by relative path
//! - A plan with no applicable file changes and no actions is `skipped`
//!   with reason `no changes`
//! - Re-planning against unchanged state yields the same decisions

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::core::state::RepositoryState;
use crate::core::task::{ExistenceMode, Safeguards, TaskDefinition};
use crate::engine::environment::Environment;
use crate::fsio::FsError;

use super::actions::files::desired_lines;
use super::actions::{
    Action, BranchPrepare, CustomTaskAction, FilesApply, GitPush, GitStageCommit, Guard,
    PullRequestOpen,
};
use super::guards::{BranchAbsentGuard, CleanWorktreeGuard, RemoteConfiguredGuard};
use super::template::{render, TemplateData, TemplateError, DEFAULT_BRANCH_TEMPLATE};

/// Plan-level skip reason when nothing would change.
pub const SKIP_REASON_NO_CHANGES: &str = "no changes";
/// File skipped because it already exists.
pub const FILE_REASON_EXISTS: &str = "exists";
/// File skipped because every desired line is already present.
pub const FILE_REASON_LINES_PRESENT: &str = "lines-present";
/// File skipped because on-disk bytes equal the rendered content.
pub const FILE_REASON_UNCHANGED: &str = "unchanged";

/// Errors from task planning.
#[derive(Debug, Error)]
pub enum TaskPlanError {
    /// A template failed to render.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A rendered file path is unusable.
    #[error("invalid file path {path:?}: {reason}")]
    InvalidFilePath {
        /// The rendered path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Two file entries rendered to the same path.
    #[error("duplicate file path {0:?}")]
    DuplicateFilePath(String),

    /// The pull-request title rendered empty.
    #[error("pull request title rendered empty")]
    EmptyPullRequestTitle,

    /// Planning could not read an existing file.
    #[error(transparent)]
    Filesystem(#[from] FsError),
}

/// One planned file mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative path.
    pub path: PathBuf,
    /// Rendered content.
    pub content: String,
    /// Existence handling mode.
    pub mode: ExistenceMode,
    /// Unix permission bits applied on write.
    pub permissions: Option<u32>,
    /// True when the change will be written.
    pub apply: bool,
    /// Why the change is skipped, when it is.
    pub skip_reason: Option<&'static str>,
}

/// One planned custom action with normalized, rendered options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    /// Handler type.
    pub action_type: String,
    /// Lowercase-trimmed keys; rendered string values.
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Planned pull-request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestPlan {
    /// Rendered title (non-empty).
    pub title: String,
    /// Rendered body.
    pub body: String,
    /// Rendered base branch.
    pub base: String,
    /// Open as draft.
    pub draft: bool,
}

/// Result of planning a task against one repository.
pub struct TaskPlan {
    /// Task name.
    pub task_name: String,
    /// Resolved branch name.
    pub branch: String,
    /// Resolved start point (may be empty).
    pub start_point: String,
    /// Resolved commit message.
    pub commit_message: String,
    /// Pass `--allow-empty` when committing.
    pub allow_empty_commit: bool,
    /// Remote for push and pull-request work (may be empty).
    pub push_remote: String,
    /// File changes sorted by relative path.
    pub files: Vec<FileChange>,
    /// Planned custom actions.
    pub actions: Vec<PlannedAction>,
    /// Planned pull request.
    pub pull_request: Option<PullRequestPlan>,
    /// The plan is a no-op.
    pub skipped: bool,
    /// Why the plan is a no-op.
    pub skip_reason: Option<String>,
    /// Variables visible at planning time.
    pub variables: BTreeMap<String, String>,
    /// Static clean-worktree requirement.
    pub ensure_clean: bool,
    /// Variable that may override the requirement.
    pub ensure_clean_variable: String,
    /// Safety switches.
    pub safeguards: Safeguards,
    /// Ordered concrete actions the executor will run.
    pub workflow_steps: Vec<Arc<dyn Action>>,
}

impl std::fmt::Debug for TaskPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPlan")
            .field("task_name", &self.task_name)
            .field("branch", &self.branch)
            .field("start_point", &self.start_point)
            .field("files", &self.files)
            .field("actions", &self.actions)
            .field("skipped", &self.skipped)
            .field(
                "workflow_steps",
                &self
                    .workflow_steps
                    .iter()
                    .map(|step| step.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl TaskPlan {
    /// File changes that will be written.
    pub fn applied_files(&self) -> impl Iterator<Item = &FileChange> {
        self.files.iter().filter(|change| change.apply)
    }

    /// True when at least one file change applies.
    pub fn has_file_work(&self) -> bool {
        self.files.iter().any(|change| change.apply)
    }

    /// The clean-worktree requirement after the variable override.
    ///
    /// When `ensure_clean_variable` names a visible variable, values
    /// `true`/`1`/`yes` force the requirement on and `false`/`0`/`no`
    /// force it off (case-insensitive); anything else falls back to the
    /// static setting.
    pub fn effective_require_clean(&self) -> bool {
        if self.ensure_clean_variable.is_empty() {
            return self.ensure_clean;
        }
        match self.variables.get(&self.ensure_clean_variable) {
            Some(value) => match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => self.ensure_clean,
            },
            None => self.ensure_clean,
        }
    }
}

/// Sanitize one branch-name component.
///
/// Separator and metacharacters become `-`; leading and trailing `-`
/// are trimmed; an empty result yields the sentinel `task`.
pub fn sanitize_branch_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            ' ' | '\t' | '\n' | '@' | '#' | '^' | '\\' | '/' => '-',
            other => other,
        })
        .collect();
    let trimmed = replaced.trim_matches('-');
    if trimmed.is_empty() {
        "task".to_string()
    } else {
        trimmed.to_string()
    }
}

fn validate_relative_path(rendered: &str) -> Result<(), TaskPlanError> {
    if rendered.is_empty() {
        return Err(TaskPlanError::InvalidFilePath {
            path: rendered.to_string(),
            reason: "empty",
        });
    }
    if rendered == "." || rendered == ".." {
        return Err(TaskPlanError::InvalidFilePath {
            path: rendered.to_string(),
            reason: "not a file",
        });
    }
    let path = Path::new(rendered);
    if path.is_absolute() {
        return Err(TaskPlanError::InvalidFilePath {
            path: rendered.to_string(),
            reason: "absolute",
        });
    }
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(TaskPlanError::InvalidFilePath {
            path: rendered.to_string(),
            reason: "escapes the repository",
        });
    }
    Ok(())
}

async fn plan_file_change(
    environment: &Environment,
    repository: &RepositoryState,
    rendered_path: &str,
    content: String,
    mode: ExistenceMode,
    permissions: Option<u32>,
) -> Result<FileChange, TaskPlanError> {
    let target = repository.path.join(rendered_path);
    let existing = match environment.filesystem().read_to_string(&target).await {
        Ok(existing) => Some(existing),
        Err(err) if err.is_not_found() => None,
        Err(err) => return Err(err.into()),
    };

    let (apply, skip_reason) = match (&existing, mode) {
        (None, _) => (true, None),
        (Some(_), ExistenceMode::SkipIfExists) => (false, Some(FILE_REASON_EXISTS)),
        (Some(existing), ExistenceMode::AppendIfMissing | ExistenceMode::LineEdit) => {
            let present = desired_lines(existing);
            let missing = desired_lines(&content)
                .into_iter()
                .any(|line| !present.contains(&line));
            if missing {
                (true, None)
            } else {
                (false, Some(FILE_REASON_LINES_PRESENT))
            }
        }
        (Some(existing), ExistenceMode::Overwrite) => {
            if *existing == content {
                (false, Some(FILE_REASON_UNCHANGED))
            } else {
                (true, None)
            }
        }
    };

    Ok(FileChange {
        path: PathBuf::from(rendered_path),
        content,
        mode,
        permissions,
        apply,
        skip_reason,
    })
}

fn assemble_workflow_steps(
    task: &TaskDefinition,
    branch: &str,
    push_remote: &str,
    has_files: bool,
    has_pull_request: bool,
    actions: &[PlannedAction],
) -> Vec<Arc<dyn Action>> {
    let mut steps: Vec<Arc<dyn Action>> = Vec::new();

    if has_files {
        let mut prepare_guards: Vec<Arc<dyn Guard>> = vec![Arc::new(CleanWorktreeGuard::new())];
        if task.safeguards.skip_if_branch_exists {
            prepare_guards.push(Arc::new(BranchAbsentGuard::new(branch.to_string())));
        }
        steps.push(Arc::new(BranchPrepare::new(prepare_guards)));
        steps.push(Arc::new(FilesApply::new(Vec::new())));
        steps.push(Arc::new(GitStageCommit::new(Vec::new())));

        let remote_guard: Vec<Arc<dyn Guard>> =
            vec![Arc::new(RemoteConfiguredGuard::new(push_remote.to_string()))];
        if has_pull_request {
            steps.push(Arc::new(PullRequestOpen::new(remote_guard)));
        } else if !push_remote.is_empty() {
            steps.push(Arc::new(GitPush::new(remote_guard)));
        }
    }

    for (index, planned) in actions.iter().enumerate() {
        // Without file work, the first custom action is the task's
        // first mutation and carries the clean-worktree guard.
        let guards: Vec<Arc<dyn Guard>> = if !has_files && index == 0 {
            vec![Arc::new(CleanWorktreeGuard::new())]
        } else {
            Vec::new()
        };
        steps.push(Arc::new(CustomTaskAction::new(
            planned.action_type.clone(),
            planned.options.clone(),
            guards,
        )));
    }

    steps
}

/// Plan a task against one repository.
pub async fn plan_task(
    environment: &Environment,
    task: &TaskDefinition,
    repository: &RepositoryState,
) -> Result<TaskPlan, TaskPlanError> {
    let variables = environment.variables().snapshot();
    let data = TemplateData::new(task, repository, variables.clone());

    // Branch name: rendered template, or automation/<sanitized name>.
    let branch = {
        let rendered = if task.branch.name.trim().is_empty() {
            String::new()
        } else {
            render("branch.name", &task.branch.name, &data)?
                .trim()
                .to_string()
        };
        if rendered.is_empty() {
            format!("automation/{}", sanitize_branch_component(&task.name))
        } else {
            rendered
        }
    };

    let start_point_template = if task.branch.start_point.trim().is_empty() {
        DEFAULT_BRANCH_TEMPLATE
    } else {
        task.branch.start_point.as_str()
    };
    let start_point = render("branch.start_point", start_point_template, &data)?
        .trim()
        .to_string();

    let commit_message = {
        let rendered = if task.commit.message.trim().is_empty() {
            String::new()
        } else {
            render("commit.message", &task.commit.message, &data)?
                .trim()
                .to_string()
        };
        if rendered.is_empty() {
            format!("Apply task {}", task.name)
        } else {
            rendered
        }
    };

    let mut files: Vec<FileChange> = Vec::with_capacity(task.files.len());
    let mut seen_paths: Vec<String> = Vec::new();
    for (index, spec) in task.files.iter().enumerate() {
        let rendered_path = render(&format!("files[{index}].path"), &spec.path, &data)?
            .trim()
            .to_string();
        validate_relative_path(&rendered_path)?;
        if seen_paths.contains(&rendered_path) {
            return Err(TaskPlanError::DuplicateFilePath(rendered_path));
        }
        seen_paths.push(rendered_path.clone());

        let content = render(&format!("files[{index}].content"), &spec.content, &data)?;
        files.push(
            plan_file_change(
                environment,
                repository,
                &rendered_path,
                content,
                spec.mode,
                spec.permissions,
            )
            .await?,
        );
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut actions: Vec<PlannedAction> = Vec::with_capacity(task.actions.len());
    for (index, spec) in task.actions.iter().enumerate() {
        let mut options = BTreeMap::new();
        for (key, value) in &spec.options {
            let normalized = key.trim().to_lowercase();
            let rendered = match value {
                serde_json::Value::String(template) => serde_json::Value::String(
                    render(&format!("actions[{index}].{normalized}"), template, &data)?
                        .trim()
                        .to_string(),
                ),
                other => other.clone(),
            };
            options.insert(normalized, rendered);
        }
        actions.push(PlannedAction {
            action_type: spec.action_type.clone(),
            options,
        });
    }

    let pull_request = match &task.pull_request {
        None => None,
        Some(spec) => {
            let title = render("pull_request.title", &spec.title, &data)?
                .trim()
                .to_string();
            if title.is_empty() {
                return Err(TaskPlanError::EmptyPullRequestTitle);
            }
            let body = render("pull_request.body", &spec.body, &data)?;
            let base_template = if spec.base.trim().is_empty() {
                DEFAULT_BRANCH_TEMPLATE
            } else {
                spec.base.as_str()
            };
            let base = render("pull_request.base", base_template, &data)?
                .trim()
                .to_string();
            Some(PullRequestPlan {
                title,
                body,
                base,
                draft: spec.draft,
            })
        }
    };

    let has_files = files.iter().any(|change| change.apply);
    let skipped = !has_files && actions.is_empty();
    let workflow_steps = if skipped {
        Vec::new()
    } else {
        assemble_workflow_steps(
            task,
            &branch,
            &task.branch.push_remote,
            has_files,
            pull_request.is_some(),
            &actions,
        )
    };

    Ok(TaskPlan {
        task_name: task.name.clone(),
        branch,
        start_point,
        commit_message,
        allow_empty_commit: task.commit.allow_empty,
        push_remote: task.branch.push_remote.clone(),
        files,
        actions,
        pull_request,
        skipped,
        skip_reason: skipped.then(|| SKIP_REASON_NO_CHANGES.to_string()),
        variables,
        ensure_clean: task.ensure_clean,
        ensure_clean_variable: task.ensure_clean_variable.clone(),
        safeguards: task.safeguards.clone(),
        workflow_steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{ActionSpec, FileSpec, PullRequestSpec};
    use crate::core::types::VariableName;
    use crate::task::testing::TaskFixture;

    fn step_names(plan: &TaskPlan) -> Vec<String> {
        plan.workflow_steps
            .iter()
            .map(|step| step.name().to_string())
            .collect()
    }

    mod branch_names {
        use super::*;

        #[test]
        fn sanitize_replaces_metacharacters() {
            assert_eq!(sanitize_branch_component("fix this@now"), "fix-this-now");
            assert_eq!(sanitize_branch_component("a#b^c\\d/e"), "a-b-c-d-e");
            assert_eq!(sanitize_branch_component("tab\there"), "tab-here");
        }

        #[test]
        fn sanitize_trims_dashes() {
            assert_eq!(sanitize_branch_component("/leading and trailing/"), "leading-and-trailing");
        }

        #[test]
        fn sanitize_empty_yields_sentinel() {
            assert_eq!(sanitize_branch_component(""), "task");
            assert_eq!(sanitize_branch_component("///"), "task");
            assert_eq!(sanitize_branch_component(" @ "), "task");
        }

        #[tokio::test]
        async fn default_branch_name_uses_sanitized_task_name() {
            let mut task = TaskFixture::file_task();
            task.name = "sync ci/config".into();
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(plan.branch, "automation/sync-ci-config");
        }

        #[tokio::test]
        async fn explicit_branch_template_renders() {
            let mut task = TaskFixture::file_task();
            task.branch.name = "chore/{{ task.name }}".into();
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(plan.branch, "chore/sync-ci");
        }
    }

    mod defaults {
        use super::*;

        #[tokio::test]
        async fn start_point_defaults_to_repository_default_branch() {
            let f = TaskFixture::with_file_task().await;
            let plan = f.plan().await;
            assert_eq!(plan.start_point, "main");
        }

        #[tokio::test]
        async fn commit_message_falls_back() {
            let f = TaskFixture::with_file_task().await;
            let plan = f.plan().await;
            assert_eq!(plan.commit_message, "Apply task sync-ci");
        }

        #[tokio::test]
        async fn explicit_commit_template_renders() {
            let mut task = TaskFixture::file_task();
            task.commit.message = "chore: {{ task.name }} for {{ repository.name }}".into();
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(plan.commit_message, "chore: sync-ci for widgets");
        }
    }

    mod file_changes {
        use super::*;

        #[tokio::test]
        async fn missing_file_applies() {
            let f = TaskFixture::with_file_task().await;
            let plan = f.plan().await;
            assert!(plan.files[0].apply);
            assert_eq!(plan.files[0].skip_reason, None);
        }

        #[tokio::test]
        async fn identical_content_is_unchanged() {
            let f = TaskFixture::with_file_task().await;
            f.fs.insert("/work/widgets/README.md", "# Widgets\n");
            let plan = f.plan().await;
            assert!(!plan.files[0].apply);
            assert_eq!(plan.files[0].skip_reason, Some(FILE_REASON_UNCHANGED));
            assert!(plan.skipped);
            assert_eq!(plan.skip_reason.as_deref(), Some(SKIP_REASON_NO_CHANGES));
        }

        #[tokio::test]
        async fn different_content_applies() {
            let f = TaskFixture::with_file_task().await;
            f.fs.insert("/work/widgets/README.md", "# Old\n");
            let plan = f.plan().await;
            assert!(plan.files[0].apply);
        }

        #[tokio::test]
        async fn skip_if_exists_skips_existing() {
            let mut task = TaskFixture::file_task();
            task.files[0].mode = ExistenceMode::SkipIfExists;
            let f = TaskFixture::new(task).await;
            f.fs.insert("/work/widgets/README.md", "anything");
            let plan = f.plan().await;
            assert!(!plan.files[0].apply);
            assert_eq!(plan.files[0].skip_reason, Some(FILE_REASON_EXISTS));
        }

        #[tokio::test]
        async fn line_edit_skips_when_lines_present() {
            let mut task = TaskFixture::file_task();
            task.files[0] = FileSpec {
                path: ".gitignore".into(),
                content: "target/\n".into(),
                mode: ExistenceMode::LineEdit,
                permissions: None,
            };
            let f = TaskFixture::new(task).await;
            f.fs.insert("/work/widgets/.gitignore", "node_modules/\n  target/  \n");
            let plan = f.plan().await;
            assert!(!plan.files[0].apply);
            assert_eq!(plan.files[0].skip_reason, Some(FILE_REASON_LINES_PRESENT));
        }

        #[tokio::test]
        async fn append_if_missing_applies_when_line_absent() {
            let mut task = TaskFixture::file_task();
            task.files[0] = FileSpec {
                path: ".gitignore".into(),
                content: "target/\n.DS_Store\n".into(),
                mode: ExistenceMode::AppendIfMissing,
                permissions: None,
            };
            let f = TaskFixture::new(task).await;
            f.fs.insert("/work/widgets/.gitignore", "target/\n");
            let plan = f.plan().await;
            assert!(plan.files[0].apply);
        }

        #[tokio::test]
        async fn changes_sorted_by_path() {
            let mut task = TaskFixture::file_task();
            task.files = vec![
                FileSpec {
                    path: "zz.txt".into(),
                    content: String::new(),
                    mode: ExistenceMode::Overwrite,
                    permissions: None,
                },
                FileSpec {
                    path: "aa.txt".into(),
                    content: String::new(),
                    mode: ExistenceMode::Overwrite,
                    permissions: None,
                },
            ];
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(plan.files[0].path, PathBuf::from("aa.txt"));
            assert_eq!(plan.files[1].path, PathBuf::from("zz.txt"));
        }

        #[tokio::test]
        async fn rendered_path_templates_resolve() {
            let mut task = TaskFixture::file_task();
            task.files[0].path = "docs/{{ task.name }}.md".into();
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(plan.files[0].path, PathBuf::from("docs/sync-ci.md"));
        }

        #[tokio::test]
        async fn invalid_paths_are_rejected() {
            for bad in ["", ".", "..", "/etc/passwd", "../outside"] {
                let mut task = TaskFixture::file_task();
                task.files[0].path = bad.into();
                let f = TaskFixture::new(task).await;
                let err = plan_task(&f.environment, &f.task, &f.repository)
                    .await
                    .unwrap_err();
                assert!(
                    matches!(err, TaskPlanError::InvalidFilePath { .. }),
                    "expected rejection for {bad:?}, got {err:?}"
                );
            }
        }

        #[tokio::test]
        async fn duplicate_paths_are_rejected() {
            let mut task = TaskFixture::file_task();
            task.files.push(task.files[0].clone());
            let f = TaskFixture::new(task).await;
            let err = plan_task(&f.environment, &f.task, &f.repository)
                .await
                .unwrap_err();
            assert!(matches!(err, TaskPlanError::DuplicateFilePath(_)));
        }
    }

    mod actions {
        use super::*;

        #[tokio::test]
        async fn option_keys_lowercase_trimmed_and_strings_rendered() {
            let mut task = TaskFixture::file_task();
            task.actions = vec![ActionSpec {
                action_type: "changelog".into(),
                options: BTreeMap::from([
                    (
                        "  Heading ".to_string(),
                        serde_json::Value::String("  {{ task.name }} changes ".into()),
                    ),
                    ("Depth".to_string(), serde_json::Value::from(3)),
                ]),
            }];
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            let options = &plan.actions[0].options;
            assert_eq!(
                options.get("heading"),
                Some(&serde_json::Value::String("sync-ci changes".into()))
            );
            assert_eq!(options.get("depth"), Some(&serde_json::Value::from(3)));
        }

        #[tokio::test]
        async fn actions_alone_prevent_skip() {
            let mut task = TaskDefinition::named("audit-only");
            task.actions = vec![ActionSpec {
                action_type: "audit".into(),
                options: BTreeMap::new(),
            }];
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert!(!plan.skipped);
            assert_eq!(step_names(&plan), vec!["task.action.audit"]);
        }
    }

    mod pull_requests {
        use super::*;

        #[tokio::test]
        async fn base_defaults_to_repository_default_branch() {
            let mut task = TaskFixture::file_task();
            task.pull_request = Some(PullRequestSpec {
                title: "Sync".into(),
                body: String::new(),
                base: String::new(),
                draft: false,
            });
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(plan.pull_request.as_ref().unwrap().base, "main");
        }

        #[tokio::test]
        async fn empty_title_is_an_error() {
            let mut task = TaskFixture::file_task();
            task.pull_request = Some(PullRequestSpec {
                title: "   ".into(),
                body: String::new(),
                base: String::new(),
                draft: false,
            });
            let f = TaskFixture::new(task).await;
            let err = plan_task(&f.environment, &f.task, &f.repository)
                .await
                .unwrap_err();
            assert!(matches!(err, TaskPlanError::EmptyPullRequestTitle));
        }
    }

    mod workflow_steps {
        use super::*;

        #[tokio::test]
        async fn file_work_without_remote_ends_at_commit() {
            let mut task = TaskFixture::file_task();
            task.branch.push_remote = String::new();
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(
                step_names(&plan),
                vec!["branch.prepare", "files.apply", "git.stage-commit"]
            );
        }

        #[tokio::test]
        async fn remote_without_pr_appends_push() {
            let f = TaskFixture::with_file_task().await;
            let plan = f.plan().await;
            assert_eq!(
                step_names(&plan),
                vec!["branch.prepare", "files.apply", "git.stage-commit", "git.push"]
            );
        }

        #[tokio::test]
        async fn pull_request_substitutes_open_composite() {
            let mut task = TaskFixture::file_task();
            task.pull_request = Some(PullRequestSpec {
                title: "Sync".into(),
                body: String::new(),
                base: String::new(),
                draft: false,
            });
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(
                step_names(&plan),
                vec![
                    "branch.prepare",
                    "files.apply",
                    "git.stage-commit",
                    "pull-request.open"
                ]
            );
        }

        #[tokio::test]
        async fn custom_actions_run_after_file_work() {
            let mut task = TaskFixture::file_task();
            task.actions = vec![ActionSpec {
                action_type: "changelog".into(),
                options: BTreeMap::new(),
            }];
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert_eq!(
                step_names(&plan),
                vec![
                    "branch.prepare",
                    "files.apply",
                    "git.stage-commit",
                    "git.push",
                    "task.action.changelog"
                ]
            );
        }

        #[tokio::test]
        async fn skipped_plans_carry_no_steps() {
            let f = TaskFixture::new(TaskDefinition::named("empty")).await;
            let plan = f.plan().await;
            assert!(plan.skipped);
            assert!(plan.workflow_steps.is_empty());
        }
    }

    mod require_clean {
        use super::*;

        #[tokio::test]
        async fn static_setting_without_variable() {
            let mut task = TaskFixture::file_task();
            task.ensure_clean = true;
            let f = TaskFixture::new(task).await;
            let plan = f.plan().await;
            assert!(plan.effective_require_clean());
        }

        #[tokio::test]
        async fn variable_overrides_in_both_directions() {
            for (value, expected) in [
                ("true", true),
                ("1", true),
                ("YES", true),
                ("false", false),
                ("0", false),
                ("No", false),
            ] {
                let mut task = TaskFixture::file_task();
                task.ensure_clean = !expected;
                task.ensure_clean_variable = "force_clean".into();
                let f = TaskFixture::new(task).await;
                f.environment
                    .variables()
                    .set(VariableName::new("force_clean").unwrap(), value);
                let plan = f.plan().await;
                assert_eq!(plan.effective_require_clean(), expected, "value {value:?}");
            }
        }

        #[tokio::test]
        async fn unrecognized_value_falls_back() {
            let mut task = TaskFixture::file_task();
            task.ensure_clean = true;
            task.ensure_clean_variable = "force_clean".into();
            let f = TaskFixture::new(task).await;
            f.environment
                .variables()
                .set(VariableName::new("force_clean").unwrap(), "maybe");
            let plan = f.plan().await;
            assert!(plan.effective_require_clean());
        }
    }

    #[tokio::test]
    async fn variables_snapshot_is_captured() {
        let f = TaskFixture::with_file_task().await;
        f.environment
            .variables()
            .set(VariableName::new("ticket").unwrap(), "FLEET-1");
        let plan = f.plan().await;
        assert_eq!(plan.variables.get("ticket"), Some(&"FLEET-1".to_string()));
    }
}
