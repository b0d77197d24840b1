//! engine::environment
//!
//! Process-scoped collaborator bag and shared mutable state.
//!
//! # Architecture
//!
//! The [`Environment`] carries every injected collaborator by reference
//! for the duration of one `execute` call. It is read-mostly; the only
//! mutable pieces live in [`SharedState`] behind a single mutex: the
//! at-most-once audit flag, the last-emitted repository header, and the
//! captured-variable tables.
//!
//! # Invariants
//!
//! - Every mutation of shared-state fields holds the mutex for the full
//!   read-modify-write
//! - Captured values are mirrored into the variable store under
//!   `Captured.<name>`; seeded variables still win there

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::audit::AuditService;
use crate::core::types::VariableName;
use crate::core::variables::VariableStore;
use crate::forge::GithubClient;
use crate::fsio::Filesystem;
use crate::git::{GitExecutor, RepositoryDiscoverer, RepositoryManager};
use crate::report::{Event, Reporter};
use crate::task::actions::custom::CustomActionHandler;
use crate::ui::{AssumeYesPrompter, Prompter};

/// Error produced when required collaborators are absent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("dependencies missing: {}", missing.join(", "))]
pub struct MissingDependencies {
    /// Names of the absent collaborators.
    pub missing: Vec<String>,
}

#[derive(Debug, Default)]
struct SharedStateInner {
    audit_report_executed: bool,
    last_repository_header: Option<String>,
    capture_kinds: BTreeMap<String, String>,
    capture_values: BTreeMap<String, String>,
}

/// Mutex-guarded mutable state shared by every operation in a run.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<SharedStateInner>,
}

impl SharedState {
    /// Create empty shared state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the single audit-report execution slot.
    ///
    /// Returns `true` exactly once per run.
    pub fn try_begin_audit_report(&self) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.audit_report_executed {
            false
        } else {
            inner.audit_report_executed = true;
            true
        }
    }

    /// True when the audit report already ran.
    pub fn audit_report_executed(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.audit_report_executed
    }

    /// Decide whether a repository header must be emitted before the
    /// next event, updating the last-header key.
    pub fn needs_repository_header(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.last_repository_header.as_deref() == Some(key) {
            false
        } else {
            inner.last_repository_header = Some(key.to_string());
            true
        }
    }

    /// Store a captured value, mirroring it into the variable store.
    ///
    /// The value is trimmed. When `overwrite` is false an existing
    /// capture of the same name is kept.
    pub fn store_capture_value(
        &self,
        variables: &VariableStore,
        name: &VariableName,
        kind: &str,
        value: &str,
        overwrite: bool,
    ) {
        let trimmed = value.trim().to_string();
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if !overwrite && inner.capture_values.contains_key(name.as_str()) {
                return;
            }
            inner
                .capture_kinds
                .insert(name.as_str().to_string(), kind.to_string());
            inner
                .capture_values
                .insert(name.as_str().to_string(), trimmed.clone());
        }
        if let Ok(mirrored) = VariableName::new(format!("Captured.{name}")) {
            variables.set(mirrored, trimmed);
        }
    }

    /// Read one captured value.
    pub fn capture_value(&self, name: &VariableName) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.capture_values.get(name.as_str()).cloned()
    }

    /// Read one captured kind.
    pub fn capture_kind(&self, name: &VariableName) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.capture_kinds.get(name.as_str()).cloned()
    }
}

/// Process-scoped collaborator bag.
///
/// Constructed once per invocation through [`Environment::builder`] and
/// carried by reference through every operation, guard, and action.
#[derive(Clone)]
pub struct Environment {
    git: Arc<dyn GitExecutor>,
    filesystem: Arc<dyn Filesystem>,
    audit: Arc<dyn AuditService>,
    reporter: Arc<dyn Reporter>,
    prompter: Arc<dyn Prompter>,
    repositories: Option<Arc<dyn RepositoryManager>>,
    github: Option<Arc<dyn GithubClient>>,
    discoverer: Option<Arc<dyn RepositoryDiscoverer>>,
    custom_actions: BTreeMap<String, Arc<dyn CustomActionHandler>>,
    variables: Arc<VariableStore>,
    shared: Arc<SharedState>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("has_repository_manager", &self.repositories.is_some())
            .field("has_github", &self.github.is_some())
            .field("custom_actions", &self.custom_actions.keys())
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Start building an environment.
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// The Git executor.
    pub fn git(&self) -> &Arc<dyn GitExecutor> {
        &self.git
    }

    /// The filesystem.
    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.filesystem
    }

    /// The audit service.
    pub fn audit(&self) -> &Arc<dyn AuditService> {
        &self.audit
    }

    /// The reporter.
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// The confirmation prompter.
    pub fn prompter(&self) -> &Arc<dyn Prompter> {
        &self.prompter
    }

    /// The repository manager, when configured.
    pub fn repositories(&self) -> Option<&Arc<dyn RepositoryManager>> {
        self.repositories.as_ref()
    }

    /// The GitHub client, when configured.
    pub fn github(&self) -> Option<&Arc<dyn GithubClient>> {
        self.github.as_ref()
    }

    /// The repository discoverer, when configured.
    pub fn discoverer(&self) -> Option<&Arc<dyn RepositoryDiscoverer>> {
        self.discoverer.as_ref()
    }

    /// Look up a custom action handler by type.
    pub fn custom_action(&self, action_type: &str) -> Option<&Arc<dyn CustomActionHandler>> {
        self.custom_actions.get(action_type)
    }

    /// The variable store.
    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.variables
    }

    /// The shared mutable state.
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Replace the prompter (used by the `assume_yes` runtime option).
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Publish an event, emitting the repository header first when the
    /// event belongs to a different repository than the previous one.
    pub fn report(&self, event: Event) {
        if !event.repository.is_empty() {
            let path = event.path.clone().unwrap_or_default();
            let key = format!("{}|{}", event.repository, path.display());
            if self.shared.needs_repository_header(&key) {
                self.reporter.repository_header(&event.repository, &path);
            }
        }
        self.reporter.publish(event);
    }
}

/// Builder for [`Environment`].
#[derive(Default)]
pub struct EnvironmentBuilder {
    git: Option<Arc<dyn GitExecutor>>,
    filesystem: Option<Arc<dyn Filesystem>>,
    audit: Option<Arc<dyn AuditService>>,
    reporter: Option<Arc<dyn Reporter>>,
    prompter: Option<Arc<dyn Prompter>>,
    repositories: Option<Arc<dyn RepositoryManager>>,
    github: Option<Arc<dyn GithubClient>>,
    discoverer: Option<Arc<dyn RepositoryDiscoverer>>,
    custom_actions: BTreeMap<String, Arc<dyn CustomActionHandler>>,
    variables: Option<Arc<VariableStore>>,
}

impl EnvironmentBuilder {
    /// Set the Git executor (required).
    pub fn git(mut self, git: Arc<dyn GitExecutor>) -> Self {
        self.git = Some(git);
        self
    }

    /// Set the filesystem (required).
    pub fn filesystem(mut self, filesystem: Arc<dyn Filesystem>) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    /// Set the audit service (required).
    pub fn audit(mut self, audit: Arc<dyn AuditService>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Set the reporter (required).
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Set the prompter. Defaults to [`AssumeYesPrompter`].
    pub fn prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    /// Set the repository manager.
    pub fn repositories(mut self, repositories: Arc<dyn RepositoryManager>) -> Self {
        self.repositories = Some(repositories);
        self
    }

    /// Set the GitHub client.
    pub fn github(mut self, github: Arc<dyn GithubClient>) -> Self {
        self.github = Some(github);
        self
    }

    /// Set the repository discoverer.
    pub fn discoverer(mut self, discoverer: Arc<dyn RepositoryDiscoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    /// Register a custom action handler under its type name.
    pub fn custom_action(
        mut self,
        action_type: impl Into<String>,
        handler: Arc<dyn CustomActionHandler>,
    ) -> Self {
        self.custom_actions.insert(action_type.into(), handler);
        self
    }

    /// Use an existing variable store.
    pub fn variables(mut self, variables: Arc<VariableStore>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Validate required collaborators and build the environment.
    ///
    /// # Errors
    ///
    /// Returns [`MissingDependencies`] naming every absent required
    /// collaborator. The GitHub client is validated separately by the
    /// executor, because `skip_repository_metadata` relaxes it.
    pub fn build(self) -> Result<Environment, MissingDependencies> {
        let mut missing = Vec::new();
        if self.git.is_none() {
            missing.push("git executor".to_string());
        }
        if self.filesystem.is_none() {
            missing.push("filesystem".to_string());
        }
        if self.audit.is_none() {
            missing.push("audit service".to_string());
        }
        if self.reporter.is_none() {
            missing.push("reporter".to_string());
        }
        if !missing.is_empty() {
            return Err(MissingDependencies { missing });
        }

        // Presence checked above.
        let git = self.git.ok_or_else(|| MissingDependencies {
            missing: vec!["git executor".to_string()],
        })?;
        let filesystem = self.filesystem.ok_or_else(|| MissingDependencies {
            missing: vec!["filesystem".to_string()],
        })?;
        let audit = self.audit.ok_or_else(|| MissingDependencies {
            missing: vec!["audit service".to_string()],
        })?;
        let reporter = self.reporter.ok_or_else(|| MissingDependencies {
            missing: vec!["reporter".to_string()],
        })?;

        Ok(Environment {
            git,
            filesystem,
            audit,
            reporter,
            prompter: self
                .prompter
                .unwrap_or_else(|| Arc::new(AssumeYesPrompter::new())),
            repositories: self.repositories,
            github: self.github,
            discoverer: self.discoverer,
            custom_actions: self.custom_actions,
            variables: self.variables.unwrap_or_default(),
            shared: Arc::new(SharedState::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MockAudit;
    use crate::fsio::MemoryFilesystem;
    use crate::git::MockGit;
    use crate::report::RecordingReporter;

    fn full_builder() -> EnvironmentBuilder {
        Environment::builder()
            .git(Arc::new(MockGit::new()))
            .filesystem(Arc::new(MemoryFilesystem::new()))
            .audit(Arc::new(MockAudit::new()))
            .reporter(Arc::new(RecordingReporter::new()))
    }

    mod builder {
        use super::*;

        #[test]
        fn build_succeeds_with_required_collaborators() {
            let env = full_builder().build().unwrap();
            assert!(env.repositories().is_none());
            assert!(env.github().is_none());
        }

        #[test]
        fn missing_dependencies_are_named() {
            let err = Environment::builder()
                .git(Arc::new(MockGit::new()))
                .build()
                .unwrap_err();
            assert_eq!(
                err.missing,
                vec!["filesystem", "audit service", "reporter"]
            );
            assert!(err.to_string().starts_with("dependencies missing:"));
        }
    }

    mod shared_state {
        use super::*;
        use crate::core::types::VariableName;

        #[test]
        fn audit_slot_claimed_once() {
            let shared = SharedState::new();
            assert!(shared.try_begin_audit_report());
            assert!(!shared.try_begin_audit_report());
            assert!(shared.audit_report_executed());
        }

        #[test]
        fn header_needed_only_on_repository_change() {
            let shared = SharedState::new();
            assert!(shared.needs_repository_header("octo/a|/work/a"));
            assert!(!shared.needs_repository_header("octo/a|/work/a"));
            assert!(shared.needs_repository_header("octo/b|/work/b"));
            assert!(shared.needs_repository_header("octo/a|/work/a"));
        }

        #[test]
        fn capture_trims_and_mirrors() {
            let shared = SharedState::new();
            let variables = VariableStore::new();
            let name = VariableName::new("owner").unwrap();
            shared.store_capture_value(&variables, &name, "string", "  octo  ", true);

            assert_eq!(shared.capture_value(&name), Some("octo".to_string()));
            assert_eq!(shared.capture_kind(&name), Some("string".to_string()));
            assert_eq!(
                variables.get(&VariableName::new("Captured.owner").unwrap()),
                Some("octo".to_string())
            );
        }

        #[test]
        fn capture_respects_overwrite_flag() {
            let shared = SharedState::new();
            let variables = VariableStore::new();
            let name = VariableName::new("owner").unwrap();
            shared.store_capture_value(&variables, &name, "string", "first", true);
            shared.store_capture_value(&variables, &name, "string", "second", false);
            assert_eq!(shared.capture_value(&name), Some("first".to_string()));

            shared.store_capture_value(&variables, &name, "string", "third", true);
            assert_eq!(shared.capture_value(&name), Some("third".to_string()));
        }
    }

    mod reporting {
        use super::*;
        use crate::report::codes;

        #[test]
        fn header_emitted_once_per_consecutive_repository() {
            let reporter = RecordingReporter::new();
            let env = full_builder()
                .reporter(Arc::new(reporter.clone()))
                .build()
                .unwrap();

            let event = |repo: &str| {
                Event::info(codes::TASK_PLAN, "planned").for_repository(repo, "/work/x")
            };
            env.report(event("octo/a"));
            env.report(event("octo/a"));
            env.report(event("octo/b"));

            assert_eq!(reporter.headers().len(), 2);
            assert_eq!(reporter.events().len(), 3);
        }

        #[test]
        fn unscoped_events_skip_headers() {
            let reporter = RecordingReporter::new();
            let env = full_builder()
                .reporter(Arc::new(reporter.clone()))
                .build()
                .unwrap();
            env.report(Event::info(codes::RUN_SUMMARY, "done"));
            assert!(reporter.headers().is_empty());
        }
    }
}
