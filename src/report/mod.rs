//! report
//!
//! Structured event model and the reporter interface.
//!
//! # Design
//!
//! Every observable engine outcome flows through a [`Reporter`] as an
//! [`Event`]: a level, a stable code, an optional repository identity,
//! and a detail map. Event codes are stable strings consumers may match
//! on; free-text lives in the message. The reporter contract requires
//! implementations to be safe for concurrent use, because operations in
//! one stage emit in parallel.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Stable event codes emitted by the engine.
pub mod codes {
    /// A task plan is ready.
    pub const TASK_PLAN: &str = "task.plan";
    /// A task completed applying changes.
    pub const TASK_APPLY: &str = "task.apply";
    /// A guard or plan caused the task to skip.
    pub const TASK_SKIP: &str = "task.skip";
    /// Operation finished without error.
    pub const OPERATION_SUCCESS: &str = "workflow.operation.success";
    /// Operation produced at least one error.
    pub const OPERATION_FAILURE: &str = "workflow.operation.failure";
    /// Run-level summary.
    pub const RUN_SUMMARY: &str = "workflow.summary";
    /// Operation changed the active branch.
    pub const REPO_SWITCHED: &str = "repo.switched";
    /// A remote needed by an action is missing.
    pub const REMOTE_MISSING: &str = "remote_missing";
    /// The origin owner could not be determined.
    pub const ORIGIN_OWNER_MISSING: &str = "origin_owner_missing";
    /// A branch start point did not resolve.
    pub const START_POINT_MISSING: &str = "start_point_missing";
    /// A pull request was opened or linked.
    pub const PULL_REQUEST_CREATED: &str = "pull_request.created";
}

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Informational.
    Info,
    /// Noteworthy but not a failure.
    Warn,
    /// A failure.
    Error,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventLevel::Info => write!(f, "info"),
            EventLevel::Warn => write!(f, "warn"),
            EventLevel::Error => write!(f, "error"),
        }
    }
}

/// A structured engine event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Severity.
    pub level: EventLevel,
    /// Stable code from [`codes`].
    pub code: String,
    /// Repository identity (`owner/name`) when repository-scoped.
    #[serde(default)]
    pub repository: String,
    /// Repository path when repository-scoped.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Human-readable message.
    pub message: String,
    /// Structured detail fields.
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl Event {
    /// Build an event with a level, code, and message.
    pub fn new(level: EventLevel, code: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            code: code.to_string(),
            repository: String::new(),
            path: None,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Info-level event.
    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::new(EventLevel::Info, code, message)
    }

    /// Warn-level event.
    pub fn warn(code: &str, message: impl Into<String>) -> Self {
        Self::new(EventLevel::Warn, code, message)
    }

    /// Error-level event.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(EventLevel::Error, code, message)
    }

    /// Attach repository identity.
    pub fn for_repository(mut self, repository: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.repository = repository.into();
        self.path = Some(path.into());
        self
    }

    /// Attach one detail field.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Reporter capability set.
///
/// Implementations must be safe for concurrent use.
pub trait Reporter: Send + Sync {
    /// Emit a structured event.
    fn publish(&self, event: Event);

    /// Announce the repository subsequent events belong to.
    ///
    /// Called at most once per run of consecutive same-repository
    /// events; see the environment's shared state.
    fn repository_header(&self, repository: &str, path: &std::path::Path) {
        let _ = (repository, path);
    }

    /// Write one formatted failure line to the error stream.
    fn write_error(&self, line: &str);

    /// Record an operation's wall-clock duration.
    fn record_operation(&self, operation: &str, duration: Duration, failed: bool) {
        let _ = (operation, duration, failed);
    }

    /// Print the final run summary. Returns the summary text.
    fn summarize(&self) -> String {
        String::new()
    }
}

/// Reporter that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl TracingReporter {
    /// Create the tracing reporter.
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for TracingReporter {
    fn publish(&self, event: Event) {
        match event.level {
            EventLevel::Info => tracing::info!(
                code = %event.code,
                repository = %event.repository,
                details = ?event.details,
                "{}",
                event.message
            ),
            EventLevel::Warn => tracing::warn!(
                code = %event.code,
                repository = %event.repository,
                details = ?event.details,
                "{}",
                event.message
            ),
            EventLevel::Error => tracing::error!(
                code = %event.code,
                repository = %event.repository,
                details = ?event.details,
                "{}",
                event.message
            ),
        }
    }

    fn write_error(&self, line: &str) {
        tracing::error!("{line}");
    }

    fn record_operation(&self, operation: &str, duration: Duration, failed: bool) {
        tracing::debug!(operation, ?duration, failed, "operation finished");
    }
}

#[derive(Debug, Default)]
struct RecordingReporterInner {
    events: Vec<Event>,
    headers: Vec<String>,
    error_lines: Vec<String>,
    operations: Vec<(String, Duration, bool)>,
}

/// Reporter that records everything for test verification.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    inner: Arc<Mutex<RecordingReporterInner>>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every published event, in order.
    pub fn events(&self) -> Vec<Event> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.events.clone()
    }

    /// Events with a given code.
    pub fn events_with_code(&self, code: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| event.code == code)
            .collect()
    }

    /// Repository headers announced so far.
    pub fn headers(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.headers.clone()
    }

    /// Error-stream lines written so far.
    pub fn error_lines(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.error_lines.clone()
    }

    /// Recorded operation durations.
    pub fn operations(&self) -> Vec<(String, Duration, bool)> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.operations.clone()
    }
}

impl Reporter for RecordingReporter {
    fn publish(&self, event: Event) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.events.push(event);
    }

    fn repository_header(&self, repository: &str, path: &std::path::Path) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .headers
            .push(format!("-- {repository} ({}) --", path.display()));
    }

    fn write_error(&self, line: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.error_lines.push(line.to_string());
    }

    fn record_operation(&self, operation: &str, duration: Duration, failed: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .operations
            .push((operation.to_string(), duration, failed));
    }

    fn summarize(&self) -> String {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let failed = inner.operations.iter().filter(|(_, _, f)| *f).count();
        format!(
            "{} operations, {} failed",
            inner.operations.len(),
            failed
        )
    }
}
