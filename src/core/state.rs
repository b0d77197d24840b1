//! core::state
//!
//! Per-repository runtime state and the run-wide state collection.
//!
//! # Architecture
//!
//! [`RepositoryState`] is the per-repository record the engine derives
//! during discovery: the canonical path, inspection metadata, and flags
//! captured before the first stage runs. [`State`] holds the sanitized
//! roots and the ordered repository list.
//!
//! # Concurrency
//!
//! The repository list is fixed in shape for the lifetime of a run: the
//! vector is never reassigned after construction. Individual entries may
//! be refreshed through the audit collaborator, so each entry sits behind
//! its own `RwLock`. Operations take cheap clones ([`State::snapshot`])
//! and must not rely on observing sibling mutations within a stage.
//!
//! # Invariants
//!
//! - `RepositoryState::path` is cleaned and absolute before deduplication
//! - Canonical identifiers are lower-cased only on case-insensitive
//!   platforms; display strings preserve the on-disk spelling

use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::audit::RepoInspection;

/// Per-repository runtime record.
///
/// Mutated only by refresh operations through the audit collaborator;
/// published before the first stage begins and read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    /// Absolute repository path.
    pub path: PathBuf,
    /// Number of path components, used for deepest-first ordering.
    pub depth: usize,
    /// Owner/repo string as recorded in the remote configuration.
    pub canonical_owner_repo: String,
    /// Owner/repo string after redirect resolution (may equal canonical).
    pub final_owner_repo: String,
    /// Currently checked-out local branch.
    pub local_branch: String,
    /// Default branch on the remote.
    pub remote_default_branch: String,
    /// Remote protocol (`ssh`, `https`, ...).
    pub remote_protocol: String,
    /// Remote URL.
    pub remote_url: String,
    /// Worktree was clean when the run started (when captured).
    pub initial_clean_worktree: bool,
    /// Another discovered repository lives beneath this one.
    pub has_nested_repositories: bool,
}

impl RepositoryState {
    /// Build a repository state from an audit inspection.
    pub fn from_inspection(inspection: &RepoInspection) -> Self {
        let path = clean_path(&inspection.path);
        let depth = path_depth(&path);
        Self {
            path,
            depth,
            canonical_owner_repo: inspection.canonical_owner_repo.clone(),
            final_owner_repo: inspection.final_owner_repo.clone(),
            local_branch: inspection.local_branch.clone(),
            remote_default_branch: inspection.remote_default_branch.clone(),
            remote_protocol: inspection.remote_protocol.clone(),
            remote_url: inspection.remote_url.clone(),
            initial_clean_worktree: false,
            has_nested_repositories: false,
        }
    }

    /// Build a minimal state for a root that the discoverer missed but a
    /// `rev-parse` probe confirmed as a repository.
    pub fn bare_path(path: &Path) -> Self {
        let path = clean_path(path);
        let depth = path_depth(&path);
        Self {
            path,
            depth,
            canonical_owner_repo: String::new(),
            final_owner_repo: String::new(),
            local_branch: String::new(),
            remote_default_branch: String::new(),
            remote_protocol: String::new(),
            remote_url: String::new(),
            initial_clean_worktree: false,
            has_nested_repositories: false,
        }
    }

    /// Apply refreshed inspection metadata in place.
    ///
    /// The path, depth, and pre-run flags are preserved; only inspection
    /// fields change.
    pub fn apply_inspection(&mut self, inspection: &RepoInspection) {
        self.canonical_owner_repo = inspection.canonical_owner_repo.clone();
        self.final_owner_repo = inspection.final_owner_repo.clone();
        self.local_branch = inspection.local_branch.clone();
        self.remote_default_branch = inspection.remote_default_branch.clone();
        self.remote_protocol = inspection.remote_protocol.clone();
        self.remote_url = inspection.remote_url.clone();
    }

    /// The owner/repo string preferred for display and API calls:
    /// the post-redirect name, falling back to the canonical one.
    pub fn effective_owner_repo(&self) -> &str {
        if self.final_owner_repo.is_empty() {
            &self.canonical_owner_repo
        } else {
            &self.final_owner_repo
        }
    }

    /// Canonical identity key for deduplication.
    pub fn canonical_id(&self) -> String {
        canonical_identifier(&self.path)
    }
}

/// The sanitized roots and ordered repository list for one run.
///
/// Immutable in shape during a run; entries may be refreshed through
/// their individual locks.
#[derive(Debug)]
pub struct State {
    roots: Vec<PathBuf>,
    repositories: Vec<RwLock<RepositoryState>>,
}

impl State {
    /// Wrap sanitized roots and discovered repositories.
    pub fn new(roots: Vec<PathBuf>, repositories: Vec<RepositoryState>) -> Self {
        Self {
            roots,
            repositories: repositories.into_iter().map(RwLock::new).collect(),
        }
    }

    /// The sanitized root paths.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Number of repositories in the run.
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// True when no repositories were discovered.
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Cheap clone of one repository's current state.
    pub fn snapshot(&self, index: usize) -> RepositoryState {
        self.repositories[index]
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clones of every repository's current state, in run order.
    pub fn snapshots(&self) -> Vec<RepositoryState> {
        (0..self.len()).map(|i| self.snapshot(i)).collect()
    }

    /// Update one repository's inspection metadata.
    ///
    /// Must run at a stage boundary (single-threaded within whichever
    /// operation triggers it).
    pub fn refresh(&self, index: usize, inspection: &RepoInspection) {
        let mut entry = self.repositories[index]
            .write()
            .unwrap_or_else(|e| e.into_inner());
        entry.apply_inspection(inspection);
    }
}

/// Lexically clean a path and make it absolute.
///
/// `.` components are dropped and `..` pops the previous component, the
/// way Go's `filepath.Clean` behaves. Relative paths are joined onto the
/// current working directory.
pub fn clean_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(component.as_os_str());
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Depth of a path, counted in components.
pub fn path_depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// Canonical identity key: cleaned, absolute, symlink-resolved, and
/// case-folded on case-insensitive platforms.
///
/// Display strings elsewhere keep the original spelling; only identity
/// comparisons use this key.
pub fn canonical_identifier(path: &Path) -> String {
    let cleaned = clean_path(path);
    let resolved = dunce::canonicalize(&cleaned).unwrap_or(cleaned);
    let display = resolved.to_string_lossy().into_owned();
    #[cfg(any(windows, target_os = "macos"))]
    {
        display.to_lowercase()
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        display
    }
}

/// Sanitize caller-supplied roots: clean each path, drop duplicates, and
/// (unless nested roots are kept) prune roots that live beneath another
/// root.
pub fn sanitize_roots(roots: &[PathBuf], keep_nested: bool) -> Vec<PathBuf> {
    let mut cleaned: Vec<PathBuf> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for root in roots {
        if root.as_os_str().is_empty() {
            continue;
        }
        let path = clean_path(root);
        let id = canonical_identifier(&path);
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);
        cleaned.push(path);
    }

    if keep_nested {
        return cleaned;
    }

    let ids: Vec<String> = cleaned.iter().map(|p| canonical_identifier(p)).collect();
    cleaned
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            !ids.iter().enumerate().any(|(j, other)| {
                *i != j && ids[*i].len() > other.len() && ids[*i].starts_with(&format!("{other}/"))
            })
        })
        .map(|(_, p)| p.clone())
        .collect()
}

/// Mark every repository that has another repository strictly beneath it.
pub fn mark_nested_ancestors(repositories: &mut [RepositoryState]) {
    let ids: Vec<String> = repositories.iter().map(|r| r.canonical_id()).collect();
    for i in 0..repositories.len() {
        let prefix = format!("{}/", ids[i]);
        repositories[i].has_nested_repositories = ids
            .iter()
            .enumerate()
            .any(|(j, other)| i != j && other.starts_with(&prefix));
    }
}

/// Stable deepest-first ordering, ties broken by path ascending.
pub fn order_by_descending_depth(repositories: &mut [RepositoryState]) {
    repositories.sort_by(|a, b| {
        b.depth
            .cmp(&a.depth)
            .then_with(|| a.path.cmp(&b.path))
    });
}
