//! core
//!
//! Domain types shared across the engine: validated names, per-repository
//! state, the workflow variable store, and declarative task definitions.

pub mod state;
pub mod task;
pub mod types;
pub mod variables;

pub use state::{RepositoryState, State};
pub use task::{
    ActionSpec, BranchSpec, CommitSpec, ExistenceMode, FileSpec, PullRequestSpec, Safeguards,
    TaskDefinition,
};
pub use types::{OwnerRepo, TypeError, VariableName};
pub use variables::VariableStore;
