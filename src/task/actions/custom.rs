//! task::actions::custom
//!
//! Dispatch to named custom-action handlers.
//!
//! # Design
//!
//! Domain-specific behavior (namespace rewrites, audit reports,
//! changelog generation, default-branch migrations) lives outside the
//! core behind the [`CustomActionHandler`] seam. Handlers are
//! registered on the environment under a type name and dispatched as
//! `task.action.<type>` with the planned, template-rendered options.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::task::context::ExecutionContext;

use super::{Action, Guard, StepError};

/// A named custom-action implementation.
#[async_trait]
pub trait CustomActionHandler: Send + Sync {
    /// Run the handler for one (repository, task) pair.
    ///
    /// Handlers may read and mutate the execution context, store
    /// captured values through the environment's shared state, and
    /// signal skips like any other step.
    async fn run(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
        options: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(), StepError>;
}

/// Dispatch one planned custom action to its registered handler.
pub struct CustomTaskAction {
    name: String,
    action_type: String,
    options: BTreeMap<String, serde_json::Value>,
    guards: Vec<Arc<dyn Guard>>,
}

impl CustomTaskAction {
    /// Build the dispatcher for a planned action.
    pub fn new(
        action_type: impl Into<String>,
        options: BTreeMap<String, serde_json::Value>,
        guards: Vec<Arc<dyn Guard>>,
    ) -> Self {
        let action_type = action_type.into();
        Self {
            name: format!("task.action.{action_type}"),
            action_type,
            options,
            guards,
        }
    }
}

impl std::fmt::Debug for CustomTaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTaskAction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Action for CustomTaskAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn guards(&self) -> &[Arc<dyn Guard>] {
        &self.guards
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<(), StepError> {
        let handler = ctx
            .environment
            .custom_action(&self.action_type)
            .cloned()
            .ok_or_else(|| {
                StepError::Fail(
                    anyhow::anyhow!("no handler registered for action type {}", self.action_type)
                        .into(),
                )
            })?;
        handler.run(cancel, ctx, &self.options).await?;
        ctx.custom_actions_run += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::testing::TaskFixture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl CustomActionHandler for CountingHandler {
        async fn run(
            &self,
            _cancel: &CancellationToken,
            _ctx: &mut ExecutionContext<'_>,
            options: &BTreeMap<String, serde_json::Value>,
        ) -> Result<(), StepError> {
            assert_eq!(
                options.get("heading"),
                Some(&serde_json::Value::String("Changes".into()))
            );
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SkippingHandler;

    #[async_trait]
    impl CustomActionHandler for SkippingHandler {
        async fn run(
            &self,
            _cancel: &CancellationToken,
            _ctx: &mut ExecutionContext<'_>,
            _options: &BTreeMap<String, serde_json::Value>,
        ) -> Result<(), StepError> {
            Err(StepError::skip("nothing to do"))
        }
    }

    fn options() -> BTreeMap<String, serde_json::Value> {
        BTreeMap::from([(
            "heading".to_string(),
            serde_json::Value::String("Changes".into()),
        )])
    }

    #[tokio::test]
    async fn dispatches_to_registered_handler_and_counts() {
        let handler = Arc::new(CountingHandler {
            runs: AtomicUsize::new(0),
        });
        let f = TaskFixture::with_custom_action("changelog", handler.clone()).await;
        let plan = f.plan().await;
        let mut ctx = f.context(&plan);

        CustomTaskAction::new("changelog", options(), Vec::new())
            .execute(&CancellationToken::new(), &mut ctx)
            .await
            .unwrap();

        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.custom_actions_run, 1);
    }

    #[tokio::test]
    async fn missing_handler_fails() {
        let f = TaskFixture::with_file_task().await;
        let plan = f.plan().await;
        let mut ctx = f.context(&plan);

        let result = CustomTaskAction::new("ghost", BTreeMap::new(), Vec::new())
            .execute(&CancellationToken::new(), &mut ctx)
            .await;
        assert!(matches!(result, Err(StepError::Fail(_))));
        assert_eq!(ctx.custom_actions_run, 0);
    }

    #[tokio::test]
    async fn handler_skip_propagates_without_counting() {
        let f = TaskFixture::with_custom_action("noop", Arc::new(SkippingHandler)).await;
        let plan = f.plan().await;
        let mut ctx = f.context(&plan);

        let result = CustomTaskAction::new("noop", BTreeMap::new(), Vec::new())
            .execute(&CancellationToken::new(), &mut ctx)
            .await;
        assert!(matches!(result, Err(StepError::Skip(_))));
        assert_eq!(ctx.custom_actions_run, 0);
    }

    #[test]
    fn name_includes_type() {
        let action = CustomTaskAction::new("audit", BTreeMap::new(), Vec::new());
        assert_eq!(action.name(), "task.action.audit");
    }
}
