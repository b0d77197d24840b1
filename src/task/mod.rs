//! task
//!
//! The per-repository task machinery: template rendering, planning, the
//! execution state machine, guards, and actions.

pub mod actions;
pub mod context;
pub mod executor;
pub mod guards;
pub mod operation;
pub mod planner;
pub mod template;

pub use context::{ExecutionContext, WorktreeCheck};
pub use executor::{execute_task, TaskOutcome};
pub use operation::TaskOperation;
pub use planner::{plan_task, FileChange, PlannedAction, PullRequestPlan, TaskPlan};
pub use template::{render, TemplateData};
