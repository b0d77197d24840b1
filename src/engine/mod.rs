//! engine
//!
//! Orchestrates the workflow lifecycle: Discover -> Plan -> Run stages.
//!
//! # Architecture
//!
//! The engine is a pure coordinator over injected collaborators:
//!
//! 1. **Validate**: required collaborators must be present
//! 2. **Sanitize**: clean, deduplicate, and optionally prune the roots
//! 3. **Discover**: derive per-repository state through the audit
//!    collaborator, supplemented by a `rev-parse` probe for roots that
//!    are themselves repositories
//! 4. **Plan**: layer the operation graph into dependency stages
//! 5. **Run**: execute stages sequentially, operations within a stage
//!    in parallel, collecting every failure
//!
//! # Invariants
//!
//! - Configuration errors surface before any stage runs
//! - Repository state is published before parallelism begins
//! - Zero failures yield `Ok`; any failure yields an error whose
//!   message is the first failure annotated with the remaining count

pub mod environment;
pub mod errors;
pub mod operation;
pub mod planner;
pub mod runner;

pub use environment::{Environment, EnvironmentBuilder, MissingDependencies, SharedState};
pub use errors::{
    ActionSkip, DomainError, DomainKind, FailureLeaf, FailureRecord, OperationError,
    OperationFailures, RepositorySkip, TaskError,
};
pub use operation::{chain, Operation, OperationNode};
pub use planner::{plan_stages, OperationStage, PlanError};
pub use runner::{OperationOutcome, RunReport, StageOutcome};

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditError, DiscoveryOptions};
use crate::core::state::{
    canonical_identifier, mark_nested_ancestors, order_by_descending_depth, sanitize_roots,
    RepositoryState, State,
};
use crate::core::types::{TypeError, VariableName};
use crate::git::{is_inside_work_tree, GitError};
use crate::report::{codes, Event};
use crate::ui::AssumeYesPrompter;

/// Caller-supplied options for one run.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Answer prompts with "yes" without querying.
    pub assume_yes: bool,
    /// Keep nested roots and mark ancestors of nested repositories.
    pub include_nested_repositories: bool,
    /// Reorder repositories deepest-first (stable, tie-break by path).
    pub process_repositories_by_descending_depth: bool,
    /// Probe clean-worktree state pre-run and cache it per repository.
    pub capture_initial_worktree_status: bool,
    /// Disable GitHub metadata resolution and relax the client check.
    pub skip_repository_metadata: bool,
    /// User-provided seed variables (locked for the whole run).
    pub variables: BTreeMap<String, String>,
}

/// Result of one `execute` call.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-stage outcomes, in order.
    pub stages: Vec<StageOutcome>,
    /// Per-operation outcomes, keyed by name.
    pub operations: BTreeMap<String, OperationOutcome>,
    /// Every collected failure.
    pub failures: Vec<FailureRecord>,
    /// Reporter summary text.
    pub summary: String,
}

/// Errors from `execute`.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Required collaborators are absent.
    #[error(transparent)]
    MissingDependencies(#[from] MissingDependencies),

    /// Root sanitization left nothing to work on.
    #[error("missing roots")]
    MissingRoots,

    /// The operation graph is invalid.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A caller-supplied variable name is invalid.
    #[error("invalid seed variable: {0}")]
    Variable(#[from] TypeError),

    /// Repository discovery failed.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// The repository probe failed unrecoverably.
    #[error("discovery failed: {0}")]
    Discovery(#[from] GitError),

    /// At least one operation failed.
    #[error("{failures}")]
    Failures {
        /// The joined failure error.
        failures: OperationFailures,
        /// Full run results, still available on failure.
        outcome: Box<ExecutionOutcome>,
    },
}

/// The top-level workflow executor.
///
/// Constructed once per invocation; lives for the `execute` call.
pub struct Executor {
    environment: Arc<Environment>,
    nodes: Vec<OperationNode>,
}

impl Executor {
    /// Build an executor from pre-built dependency nodes.
    pub fn new(environment: Arc<Environment>, nodes: Vec<OperationNode>) -> Self {
        Self { environment, nodes }
    }

    /// Build an executor from a flat operation list (a chain).
    pub fn from_operations(
        environment: Arc<Environment>,
        operations: Vec<Arc<dyn Operation>>,
    ) -> Self {
        let nodes = chain(operations);
        Self::new(environment, nodes)
    }

    /// Run the workflow against the given roots.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        roots: &[PathBuf],
        options: &RuntimeOptions,
    ) -> Result<ExecutionOutcome, ExecuteError> {
        let started_at = Utc::now();

        if !options.skip_repository_metadata && self.environment.github().is_none() {
            return Err(MissingDependencies {
                missing: vec!["github client".to_string()],
            }
            .into());
        }

        let roots = sanitize_roots(roots, options.include_nested_repositories);
        if roots.is_empty() {
            return Err(ExecuteError::MissingRoots);
        }

        // Configuration errors must surface before any stage runs.
        let stages = plan_stages(&self.nodes)?;

        let mut repositories = self.discover(cancel, &roots).await?;

        if options.include_nested_repositories {
            mark_nested_ancestors(&mut repositories);
        }
        if options.capture_initial_worktree_status {
            if let Some(manager) = self.environment.repositories() {
                for repository in &mut repositories {
                    if let Ok(entries) = manager
                        .check_clean_worktree(cancel, &repository.path)
                        .await
                    {
                        repository.initial_clean_worktree = entries.is_empty();
                    }
                }
            }
        }
        if options.process_repositories_by_descending_depth {
            order_by_descending_depth(&mut repositories);
        }

        let variables = self.environment.variables();
        variables.seed(
            VariableName::new("workflow_run_id")?,
            Utc::now().format("%Y%m%dT%H%M%S").to_string(),
        );
        for (name, value) in &options.variables {
            variables.seed(VariableName::new(name.as_str())?, value.clone());
        }

        let environment = if options.assume_yes {
            Arc::new(
                self.environment
                    .as_ref()
                    .clone()
                    .with_prompter(Arc::new(AssumeYesPrompter::new())),
            )
        } else {
            Arc::clone(&self.environment)
        };

        tracing::info!(
            repositories = repositories.len(),
            stages = stages.len(),
            "starting workflow run"
        );

        // Publish-before-parallelism: repository state is final from
        // here on, except for explicit refresh calls.
        let state = Arc::new(State::new(roots, repositories));
        let report = runner::run_stages(cancel, &environment, &state, stages).await;

        let summary = environment.reporter().summarize();
        environment.report(
            Event::info(codes::RUN_SUMMARY, summary.clone())
                .detail("operations", report.operations.len().to_string())
                .detail("failures", report.failures.len().to_string()),
        );
        tracing::info!(
            operations = report.operations.len(),
            failures = report.failures.len(),
            "workflow run finished"
        );

        let outcome = ExecutionOutcome {
            started_at,
            finished_at: Utc::now(),
            stages: report.stages,
            operations: report.operations,
            failures: report.failures,
            summary,
        };

        if outcome.failures.is_empty() {
            Ok(outcome)
        } else {
            Err(ExecuteError::Failures {
                failures: OperationFailures::new(outcome.failures.clone()),
                outcome: Box::new(outcome),
            })
        }
    }

    /// Discover repositories beneath the roots.
    ///
    /// Primary source is the audit collaborator; the optional discoverer
    /// and a `rev-parse --is-inside-work-tree` probe on the roots
    /// themselves supplement it. Results deduplicate on the canonical
    /// identifier.
    async fn discover(
        &self,
        cancel: &CancellationToken,
        roots: &[PathBuf],
    ) -> Result<Vec<RepositoryState>, ExecuteError> {
        let environment = &self.environment;
        let mut repositories: Vec<RepositoryState> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let inspections = environment
            .audit()
            .discover_inspections(cancel, roots, DiscoveryOptions::default())
            .await?;
        for inspection in &inspections {
            let repository = RepositoryState::from_inspection(inspection);
            if seen.insert(repository.canonical_id()) {
                repositories.push(repository);
            }
        }

        if let Some(discoverer) = environment.discoverer() {
            let paths = discoverer.discover_repositories(cancel, roots).await?;
            for path in paths {
                if !seen.contains(&canonical_identifier(&path)) {
                    let repository = match environment.audit().inspect(cancel, &path).await {
                        Ok(inspection) => RepositoryState::from_inspection(&inspection),
                        Err(_) => RepositoryState::bare_path(&path),
                    };
                    if seen.insert(repository.canonical_id()) {
                        repositories.push(repository);
                    }
                }
            }
        }

        for root in roots {
            if seen.contains(&canonical_identifier(root)) {
                continue;
            }
            if is_inside_work_tree(environment.git().as_ref(), cancel, root).await {
                let repository = match environment.audit().inspect(cancel, root).await {
                    Ok(inspection) => RepositoryState::from_inspection(&inspection),
                    Err(_) => RepositoryState::bare_path(root),
                };
                if seen.insert(repository.canonical_id()) {
                    repositories.push(repository);
                }
            }
        }

        Ok(repositories)
    }
}
