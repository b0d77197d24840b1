//! task::actions::files
//!
//! File application.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::task::ExistenceMode;
use crate::task::context::ExecutionContext;

use super::{Action, Guard, StepError};

/// Split content into trimmed, non-empty lines.
pub fn desired_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Append `missing` to `existing`, terminating every appended line.
fn append_lines(existing: &str, missing: &[String]) -> String {
    let mut updated = existing.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    for line in missing {
        updated.push_str(line);
        updated.push('\n');
    }
    updated
}

/// Write every applicable file change.
///
/// Overwrite and skip-if-exists changes replace the file wholesale;
/// append-if-missing and line-edit changes append only the desired
/// lines not already present (trimmed comparison), preserving existing
/// content.
pub struct FilesApply {
    guards: Vec<Arc<dyn Guard>>,
}

impl FilesApply {
    /// Build the action with its guards.
    pub fn new(guards: Vec<Arc<dyn Guard>>) -> Self {
        Self { guards }
    }
}

impl std::fmt::Debug for FilesApply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesApply")
            .field("guards", &self.guards.len())
            .finish()
    }
}

#[async_trait]
impl Action for FilesApply {
    fn name(&self) -> &str {
        "files.apply"
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        let filesystem = ctx.environment.filesystem();
        let mut wrote = false;

        for change in ctx.plan.applied_files() {
            let target = ctx.repository.path.join(&change.path);
            if let Some(parent) = target.parent() {
                filesystem.mkdir_all(parent).await?;
            }

            let contents = match change.mode {
                ExistenceMode::AppendIfMissing | ExistenceMode::LineEdit => {
                    match filesystem.read_to_string(&target).await {
                        Ok(existing) => {
                            let present = desired_lines(&existing);
                            let missing: Vec<String> = desired_lines(&change.content)
                                .into_iter()
                                .filter(|line| !present.contains(line))
                                .collect();
                            if missing.is_empty() {
                                continue;
                            }
                            append_lines(&existing, &missing)
                        }
                        Err(err) if err.is_not_found() => change.content.clone(),
                        Err(err) => return Err(err.into()),
                    }
                }
                ExistenceMode::Overwrite | ExistenceMode::SkipIfExists => change.content.clone(),
            };

            filesystem
                .write(&target, &contents, change.permissions)
                .await?;
            wrote = true;
        }

        if wrote {
            ctx.files_applied = true;
        }
        Ok(())
    }
}
