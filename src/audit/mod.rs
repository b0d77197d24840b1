//! audit
//!
//! Inspection service interface.
//!
//! # Design
//!
//! The audit collaborator owns repository discovery and metadata
//! derivation (owner/repo resolution, branch and remote facts). The
//! engine consumes it through [`AuditService`]; the concrete
//! implementation lives outside the core. [`MockAudit`] provides a
//! scripted stand-in for tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from the audit service.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    /// Discovery failed beneath a root.
    #[error("discovery failed under {root}: {message}")]
    DiscoveryFailed {
        /// Root being walked.
        root: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A single repository could not be inspected.
    #[error("inspection failed for {path}: {message}")]
    InspectionFailed {
        /// Repository path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The call was cancelled.
    #[error("audit call cancelled")]
    Cancelled,
}

/// Per-repository metadata derived by the audit service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInspection {
    /// Repository path.
    pub path: PathBuf,
    /// Owner/repo string as recorded in the remote configuration.
    pub canonical_owner_repo: String,
    /// Owner/repo string after redirect resolution.
    pub final_owner_repo: String,
    /// Currently checked-out local branch.
    pub local_branch: String,
    /// Default branch on the remote.
    pub remote_default_branch: String,
    /// Remote protocol (`ssh`, `https`, ...).
    pub remote_protocol: String,
    /// Remote URL.
    pub remote_url: String,
}

impl RepoInspection {
    /// A minimal inspection carrying only a path.
    pub fn bare(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            canonical_owner_repo: String::new(),
            final_owner_repo: String::new(),
            local_branch: String::new(),
            remote_default_branch: String::new(),
            remote_protocol: String::new(),
            remote_url: String::new(),
        }
    }
}

/// Options controlling a discovery walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Descend into submodules.
    pub include_submodules: bool,
    /// Follow symlinked directories.
    pub follow_symlinks: bool,
    /// Maximum walk depth; `None` means unbounded.
    pub depth: Option<usize>,
}

/// The audit capability set.
#[async_trait]
pub trait AuditService: Send + Sync {
    /// Discover repositories beneath the roots and derive their metadata.
    async fn discover_inspections(
        &self,
        cancel: &CancellationToken,
        roots: &[PathBuf],
        options: DiscoveryOptions,
    ) -> Result<Vec<RepoInspection>, AuditError>;

    /// Re-derive metadata for one repository.
    async fn inspect(
        &self,
        cancel: &CancellationToken,
        path: &Path,
    ) -> Result<RepoInspection, AuditError>;
}

#[derive(Debug, Default)]
struct MockAuditInner {
    inspections: Vec<RepoInspection>,
    discover_calls: usize,
}

/// Scripted audit service for tests.
#[derive(Debug, Clone, Default)]
pub struct MockAudit {
    inner: Arc<Mutex<MockAuditInner>>,
}

impl MockAudit {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the inspections discovery returns.
    pub fn with_inspections(inspections: Vec<RepoInspection>) -> Self {
        let mock = Self::new();
        {
            let mut inner = mock.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.inspections = inspections;
        }
        mock
    }

    /// Number of discovery calls so far.
    pub fn discover_calls(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.discover_calls
    }
}

#[async_trait]
impl AuditService for MockAudit {
    async fn discover_inspections(
        &self,
        cancel: &CancellationToken,
        roots: &[PathBuf],
        _options: DiscoveryOptions,
    ) -> Result<Vec<RepoInspection>, AuditError> {
        if cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.discover_calls += 1;
        Ok(inner
            .inspections
            .iter()
            .filter(|inspection| roots.iter().any(|root| inspection.path.starts_with(root)))
            .cloned()
            .collect())
    }

    async fn inspect(
        &self,
        cancel: &CancellationToken,
        path: &Path,
    ) -> Result<RepoInspection, AuditError> {
        if cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .inspections
            .iter()
            .find(|inspection| inspection.path == path)
            .cloned()
            .ok_or_else(|| AuditError::InspectionFailed {
                path: path.to_path_buf(),
                message: "not scripted".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspection(path: &str) -> RepoInspection {
        RepoInspection {
            path: PathBuf::from(path),
            canonical_owner_repo: "octo/repo".into(),
            final_owner_repo: "octo/repo".into(),
            local_branch: "main".into(),
            remote_default_branch: "main".into(),
            remote_protocol: "ssh".into(),
            remote_url: "git@github.com:octo/repo.git".into(),
        }
    }

    #[tokio::test]
    async fn discovery_filters_by_root() {
        let audit = MockAudit::with_inspections(vec![
            inspection("/work/one"),
            inspection("/elsewhere/two"),
        ]);
        let found = audit
            .discover_inspections(
                &CancellationToken::new(),
                &[PathBuf::from("/work")],
                DiscoveryOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, PathBuf::from("/work/one"));
        assert_eq!(audit.discover_calls(), 1);
    }

    #[tokio::test]
    async fn inspect_replays_scripted_entry() {
        let audit = MockAudit::with_inspections(vec![inspection("/work/one")]);
        let found = audit
            .inspect(&CancellationToken::new(), Path::new("/work/one"))
            .await
            .unwrap();
        assert_eq!(found.local_branch, "main");

        let err = audit
            .inspect(&CancellationToken::new(), Path::new("/work/unknown"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::InspectionFailed { .. }));
    }
}
