//! engine::errors
//!
//! Skip and failure taxonomy for the workflow engine.
//!
//! # Architecture
//!
//! Errors come in three flavors with distinct propagation rules:
//!
//! 1. **Skips** ([`ActionSkip`], [`RepositorySkip`]) - a guard or action
//!    decided a task should not apply. Reported as `task.skip` events,
//!    never counted as failures.
//! 2. **Domain errors** ([`DomainError`]) - structured repository-scoped
//!    failures carrying an event code, formatted as
//!    `code: owner/name (path) message` and self-reported by the stage
//!    runner.
//! 3. **Everything else** - arbitrary causes wrapped in
//!    [`OperationError::Other`].
//!
//! Operations may return a single error or an aggregate of many;
//! [`OperationError::flatten`] folds either shape into leaves so the
//! stage runner can account for each sub-error exactly once.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

/// Signal from a guard or action that the task should skip.
///
/// Skips carry a short reason and optional string-keyed fields for the
/// `task.skip` event. They are not failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSkip {
    /// Why the task is skipping.
    pub reason: String,
    /// Structured context for the skip event.
    pub fields: BTreeMap<String, String>,
}

impl ActionSkip {
    /// Build a skip with a reason and no fields.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach one field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Deduplication key: trimmed reason plus sorted `key=value` pairs.
    ///
    /// Repeated skips with the same key are recorded but not re-warned.
    pub fn dedup_key(&self) -> String {
        let mut key = self.reason.trim().to_string();
        for (name, value) in &self.fields {
            key.push('|');
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }
        key
    }
}

impl std::fmt::Display for ActionSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// A task intentionally did not apply to a repository.
///
/// Upstream layers detect this variant to exclude the repository from
/// failure accounting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("repository {repository} skipped: {skip}")]
pub struct RepositorySkip {
    /// Repository identity (`owner/name` or path).
    pub repository: String,
    /// The originating skip.
    pub skip: ActionSkip,
}

/// Result of running a single task against a single repository.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task skipped; not a failure.
    #[error(transparent)]
    Skipped(#[from] RepositorySkip),

    /// The task failed.
    #[error(transparent)]
    Failed(#[from] OperationError),
}

/// Kind of a structured domain failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    /// Repository metadata was missing or unusable.
    Metadata,
    /// A remote interaction failed.
    Remote,
    /// Local execution failed.
    Execution,
}

/// A structured repository-scoped failure.
///
/// Formatted as `code: owner/name (path) message`; the repository-error
/// reporter emits these itself, so the stage runner does not write them
/// to the error stream a second time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {repository} ({}) {message}", .path.display())]
pub struct DomainError {
    /// Stable event code (see [`crate::report::codes`]).
    pub code: String,
    /// Repository identity (`owner/name`).
    pub repository: String,
    /// Repository path.
    pub path: PathBuf,
    /// Failure kind.
    pub kind: DomainKind,
    /// Human-readable message.
    pub message: String,
}

/// An operation's failure: a structured domain error, an aggregate of
/// sub-errors, or an arbitrary wrapped cause.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Structured repository-scoped failure.
    #[error(transparent)]
    Domain(DomainError),

    /// Multiple independent sub-errors.
    #[error("{} failures", .0.len())]
    Aggregate(Vec<OperationError>),

    /// Arbitrary wrapped cause.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A flattened failure leaf.
#[derive(Debug)]
pub enum FailureLeaf<'a> {
    /// A structured domain failure.
    Domain(&'a DomainError),
    /// Any other cause.
    Other(&'a anyhow::Error),
}

impl FailureLeaf<'_> {
    /// Format the leaf for the error stream.
    ///
    /// Domain leaves use their own format; other leaves are prefixed
    /// with the operation name.
    pub fn format(&self, operation: &str) -> String {
        match self {
            FailureLeaf::Domain(domain) => domain.to_string(),
            FailureLeaf::Other(err) => format!("operation {operation}: {err:#}"),
        }
    }

    /// True when the repository-error reporter already logged this leaf.
    pub fn is_self_reported(&self) -> bool {
        matches!(self, FailureLeaf::Domain(_))
    }
}

impl OperationError {
    /// Build an aggregate, collapsing the one-element case.
    pub fn aggregate(mut errors: Vec<OperationError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            OperationError::Aggregate(errors)
        }
    }

    /// Fold into failure leaves.
    ///
    /// Aggregates recurse into each child; wrapped causes that carry a
    /// [`DomainError`] anywhere in their chain classify as domain
    /// leaves; everything else yields a single leaf.
    pub fn flatten(&self) -> Vec<FailureLeaf<'_>> {
        match self {
            OperationError::Domain(domain) => vec![FailureLeaf::Domain(domain)],
            OperationError::Aggregate(children) => {
                children.iter().flat_map(|child| child.flatten()).collect()
            }
            OperationError::Other(err) => {
                for cause in err.chain() {
                    if let Some(domain) = cause.downcast_ref::<DomainError>() {
                        return vec![FailureLeaf::Domain(domain)];
                    }
                }
                vec![FailureLeaf::Other(err)]
            }
        }
    }

    /// Number of failure leaves.
    pub fn leaf_count(&self) -> usize {
        self.flatten().len()
    }
}

/// A recorded operation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Operation that produced the failure.
    pub operation: String,
    /// Formatted failure message.
    pub message: String,
}

/// Top-level error returned by the executor when any operation failed.
///
/// The message is the first failure's formatted message, annotated with
/// the count of remaining failures.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OperationFailures {
    message: String,
    /// Every collected failure, in stage order.
    pub failures: Vec<FailureRecord>,
}

impl OperationFailures {
    /// Join collected failures into the aggregate error.
    ///
    /// Callers must pass a non-empty list; an empty run returns `Ok`
    /// upstream instead of constructing this type.
    pub fn new(failures: Vec<FailureRecord>) -> Self {
        let message = match failures.len() {
            0 => "operation failed".to_string(),
            1 => failures[0].message.clone(),
            n => format!("{} (and {} more failures)", failures[0].message, n - 1),
        };
        Self { message, failures }
    }
}
