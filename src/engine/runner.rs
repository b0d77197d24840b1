//! engine::runner
//!
//! Parallel stage execution with structured failure collection.
//!
//! # Architecture
//!
//! For each stage in order, every node's operation is launched on a
//! `JoinSet` and the stage completes only when all of them have
//! finished. Stages are a barrier: stage N+1 observes every effect of
//! stage N.
//!
//! # Failure isolation
//!
//! A failing operation cancels nothing: peers in its stage and all
//! later stages still run. Failures are decomposed into leaves and
//! collected; each leaf reaches the error stream exactly once, either
//! through the repository-error event (domain leaves) or through a
//! formatted line carrying the operation name.
//!
//! # Concurrency
//!
//! The failure list and the per-operation outcome map are protected by
//! separate mutexes. Reporter and logger implementations must be safe
//! for concurrent use.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::environment::Environment;
use super::errors::{DomainError, FailureRecord};
use super::planner::OperationStage;
use crate::core::state::State;
use crate::report::{codes, Event, EventLevel};

/// Result of one operation invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Operation name.
    pub operation: String,
    /// Wall-clock duration.
    pub duration: Duration,
    /// True when the operation returned an error.
    pub failed: bool,
}

/// Result of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    /// Stage index in plan order.
    pub index: usize,
    /// Names of the operations the stage ran.
    pub operations: Vec<String>,
    /// Wall-clock duration of the whole stage.
    pub duration: Duration,
    /// Number of failed operations in the stage.
    pub failed_operations: usize,
}

/// Aggregated results from running all stages.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Per-stage outcomes, in order.
    pub stages: Vec<StageOutcome>,
    /// Per-operation outcomes, keyed by operation name.
    pub operations: BTreeMap<String, OperationOutcome>,
    /// Collected failure leaves, in completion order.
    pub failures: Vec<FailureRecord>,
}

fn domain_event(domain: &DomainError) -> Event {
    Event::new(EventLevel::Error, &domain.code, domain.message.clone())
        .for_repository(domain.repository.clone(), domain.path.clone())
}

/// Run every stage in order, launching nodes within a stage in parallel.
pub async fn run_stages(
    cancel: &CancellationToken,
    environment: &Arc<Environment>,
    state: &Arc<State>,
    stages: Vec<OperationStage>,
) -> RunReport {
    let failures: Arc<Mutex<Vec<FailureRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let outcomes: Arc<Mutex<BTreeMap<String, OperationOutcome>>> =
        Arc::new(Mutex::new(BTreeMap::new()));
    let mut stage_outcomes = Vec::with_capacity(stages.len());

    for (index, stage) in stages.into_iter().enumerate() {
        if stage.nodes.is_empty() {
            continue;
        }
        let stage_started = Instant::now();
        let operation_names: Vec<String> =
            stage.nodes.iter().map(|node| node.name.clone()).collect();

        let mut join_set = JoinSet::new();
        for node in stage.nodes {
            let cancel = cancel.clone();
            let environment = Arc::clone(environment);
            let state = Arc::clone(state);
            let failures = Arc::clone(&failures);
            let outcomes = Arc::clone(&outcomes);
            join_set.spawn(async move {
                run_operation(&cancel, &environment, &state, node, &failures, &outcomes).await;
            });
        }
        // The barrier: a later stage begins strictly after every
        // operation of this one has terminated.
        while join_set.join_next().await.is_some() {}

        let duration = stage_started.elapsed();
        let failed_operations = {
            let outcomes = outcomes.lock().unwrap_or_else(|e| e.into_inner());
            operation_names
                .iter()
                .filter(|name| outcomes.get(*name).is_some_and(|o| o.failed))
                .count()
        };
        tracing::info!(
            stage = index,
            operations = operation_names.len(),
            failed = failed_operations,
            ?duration,
            "stage complete"
        );
        stage_outcomes.push(StageOutcome {
            index,
            operations: operation_names,
            duration,
            failed_operations,
        });
    }

    let failures = failures.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let operations = outcomes.lock().unwrap_or_else(|e| e.into_inner()).clone();
    RunReport {
        stages: stage_outcomes,
        operations,
        failures,
    }
}

async fn run_operation(
    cancel: &CancellationToken,
    environment: &Environment,
    state: &State,
    node: crate::engine::operation::OperationNode,
    failures: &Mutex<Vec<FailureRecord>>,
    outcomes: &Mutex<BTreeMap<String, OperationOutcome>>,
) {
    let started = Instant::now();
    let result = node.operation.execute(cancel, environment, state).await;
    let duration = started.elapsed();

    let failed = result.is_err();
    environment
        .reporter()
        .record_operation(&node.name, duration, failed);

    match result {
        Ok(()) => {
            environment.report(
                Event::info(codes::OPERATION_SUCCESS, format!("operation {} succeeded", node.name))
                    .detail("operation", node.name.clone())
                    .detail("duration_ms", duration.as_millis().to_string()),
            );
        }
        Err(error) => {
            environment.report(
                Event::error(
                    codes::OPERATION_FAILURE,
                    format!("operation {} failed: {error}", node.name),
                )
                .detail("operation", node.name.clone())
                .detail("duration_ms", duration.as_millis().to_string()),
            );
            let mut collected = Vec::new();
            for leaf in error.flatten() {
                let message = leaf.format(&node.name);
                if leaf.is_self_reported() {
                    if let crate::engine::errors::FailureLeaf::Domain(domain) = &leaf {
                        environment.report(domain_event(domain));
                    }
                } else {
                    environment.reporter().write_error(&message);
                }
                collected.push(FailureRecord {
                    operation: node.name.clone(),
                    message,
                });
            }
            let mut failures = failures.lock().unwrap_or_else(|e| e.into_inner());
            failures.extend(collected);
        }
    }

    let mut outcomes = outcomes.lock().unwrap_or_else(|e| e.into_inner());
    outcomes.insert(
        node.name.clone(),
        OperationOutcome {
            operation: node.name,
            duration,
            failed,
        },
    );
}
