//! gitfleet - a workflow automation engine for fleets of Git repositories
//!
//! Given one or more filesystem roots and a declarative list of
//! operations, gitfleet discovers the repositories beneath those roots,
//! derives per-repository state, and applies operations concurrently:
//! file mutations, branch work, commits, pushes, pull-request creation,
//! and custom task actions.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`engine`] - Top-level executor, operation graph planner, parallel
//!   stage runner, environment, and the error model
//! - [`task`] - Per-repository task planning and execution: templates,
//!   guards, actions
//! - [`core`] - Domain types, repository state, variables, task
//!   definitions
//! - [`git`] - Single interface for all Git operations
//! - [`forge`] - GitHub client abstraction
//! - [`fsio`] - Filesystem abstraction
//! - [`audit`] - Repository inspection service interface
//! - [`report`] - Structured events and the reporter interface
//! - [`ui`] - Confirmation prompter interface
//!
//! # Correctness Invariants
//!
//! 1. Operations within a stage run in parallel; stages are strict
//!    barriers with happens-before ordering
//! 2. A failing operation never cancels its peers or later stages;
//!    every failure is collected and surfaced exactly once
//! 3. A skip is an intentional no-op, distinct from both success and
//!    failure
//! 4. Seeded variables never change for the lifetime of a run
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use gitfleet::audit::MockAudit;
//! use gitfleet::core::task::TaskDefinition;
//! use gitfleet::engine::{Executor, RuntimeOptions};
//! use gitfleet::engine::Environment;
//! use gitfleet::fsio::OsFilesystem;
//! use gitfleet::git::SystemGitExecutor;
//! use gitfleet::report::TracingReporter;
//! use gitfleet::task::TaskOperation;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let environment = Arc::new(
//!     Environment::builder()
//!         .git(Arc::new(SystemGitExecutor::new()))
//!         .filesystem(Arc::new(OsFilesystem::new()))
//!         .audit(Arc::new(MockAudit::new()))
//!         .reporter(Arc::new(TracingReporter::new()))
//!         .build()?,
//! );
//!
//! let task: TaskDefinition = serde_json::from_str(
//!     r#"{"name": "add-editorconfig",
//!         "files": [{"path": ".editorconfig", "content": "root = true\n"}]}"#,
//! )?;
//!
//! let executor = Executor::from_operations(
//!     environment,
//!     vec![Arc::new(TaskOperation::new(task))],
//! );
//! let options = RuntimeOptions {
//!     skip_repository_metadata: true,
//!     ..RuntimeOptions::default()
//! };
//! let outcome = executor
//!     .execute(&CancellationToken::new(), &["/work".into()], &options)
//!     .await?;
//! println!("{}", outcome.summary);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod core;
pub mod engine;
pub mod forge;
pub mod fsio;
pub mod git;
pub mod report;
pub mod task;
pub mod ui;
