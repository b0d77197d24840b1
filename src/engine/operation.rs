//! engine::operation
//!
//! The operation contract and dependency-annotated nodes.
//!
//! # Design
//!
//! An [`Operation`] is a named unit of workflow that runs across all
//! repositories. Implementations are polymorphic over the capability
//! set `{name, execute}`; the engine composes them into a dependency
//! graph through [`OperationNode`]s. A flat list forms a chain (each
//! node depends on the previous one); richer DAGs supply nodes
//! directly.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::environment::Environment;
use super::errors::OperationError;
use crate::core::state::State;

/// A named unit of workflow executed across all repositories.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; nodes within a stage run
/// concurrently.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Operation name, used in events and failure accounting.
    fn name(&self) -> &str;

    /// Run the operation across the run's repositories.
    ///
    /// Returns either success or an aggregate error; see
    /// [`OperationError`] for the failure shapes.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        environment: &Environment,
        state: &State,
    ) -> Result<(), OperationError>;
}

/// An operation annotated with a unique step name and dependencies.
#[derive(Clone)]
pub struct OperationNode {
    /// Unique step name within one executor instance.
    pub name: String,
    /// Step names this node waits for.
    pub dependencies: Vec<String>,
    /// The operation to run.
    pub operation: Arc<dyn Operation>,
}

impl OperationNode {
    /// A root node with no dependencies.
    pub fn new(name: impl Into<String>, operation: Arc<dyn Operation>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            operation,
        }
    }

    /// Add dependencies.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }
}

impl std::fmt::Debug for OperationNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationNode")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("operation", &self.operation.name())
            .finish()
    }
}

/// Chain operations: each depends on the previous one.
///
/// Node names come from the operations themselves.
pub fn chain(operations: Vec<Arc<dyn Operation>>) -> Vec<OperationNode> {
    let mut nodes: Vec<OperationNode> = Vec::with_capacity(operations.len());
    for operation in operations {
        let name = operation.name().to_string();
        let mut node = OperationNode::new(name, operation);
        if let Some(previous) = nodes.last() {
            node.dependencies.push(previous.name.clone());
        }
        nodes.push(node);
    }
    nodes
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted operation for engine tests.
    pub struct FakeOperation {
        pub name: String,
        pub result: Box<dyn Fn() -> Result<(), OperationError> + Send + Sync>,
        pub delay: Option<Duration>,
        pub executions: AtomicUsize,
    }

    impl FakeOperation {
        pub fn succeeding(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                result: Box::new(|| Ok(())),
                delay: None,
                executions: AtomicUsize::new(0),
            })
        }

        pub fn failing(name: &str, message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                result: Box::new(move || Err(OperationError::Other(anyhow::anyhow!(message)))),
                delay: None,
                executions: AtomicUsize::new(0),
            })
        }

        pub fn execution_count(&self) -> usize {
            self.executions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Operation for FakeOperation {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(
            &self,
            _cancel: &CancellationToken,
            _environment: &Environment,
            _state: &State,
        ) -> Result<(), OperationError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.executions.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }
}
