//! Concurrent execution of validated chains.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tool_executor::ToolExecutor;
use tool_primitives::{ExecutionContext, FailureKind, ToolOutcome};

use crate::binding::{evaluate_condition, resolve_binding};
use crate::definition::{ChainDefinition, ErrorPolicy};
use crate::error::ChainError;
use crate::graph::ChainGraph;
use crate::worker_pool::WorkerPool;

/// Terminal state a step reached during a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepDisposition {
    /// The step ran and succeeded.
    Completed,
    /// The step ran and failed.
    Failed,
    /// The step's condition evaluated false; it never ran.
    Skipped,
    /// The step never started because the chain halted or was cancelled.
    NotRun,
}

/// Aggregated result of one chain run.
///
/// Step outcomes are collected as they finish, so a cancelled or halted run
/// still carries everything that completed before the stop.
#[derive(Debug)]
pub struct ChainRunResult {
    success: bool,
    outcomes: HashMap<String, ToolOutcome>,
    dispositions: HashMap<String, StepDisposition>,
    duration: Duration,
}

impl ChainRunResult {
    /// Returns `true` when no step failed under [`ErrorPolicy::StopChain`]
    /// and the run was not cancelled.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the outcome of a step that ran.
    #[must_use]
    pub fn outcome(&self, step_id: &str) -> Option<&ToolOutcome> {
        self.outcomes.get(step_id)
    }

    /// Returns every collected step outcome keyed by step id.
    #[must_use]
    pub const fn outcomes(&self) -> &HashMap<String, ToolOutcome> {
        &self.outcomes
    }

    /// Returns the terminal state of a step.
    #[must_use]
    pub fn disposition(&self, step_id: &str) -> Option<StepDisposition> {
        self.dispositions.get(step_id).copied()
    }

    /// Returns every step's terminal state keyed by step id.
    #[must_use]
    pub const fn dispositions(&self) -> &HashMap<String, StepDisposition> {
        &self.dispositions
    }

    /// Returns the wall-clock duration of the whole run.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }
}

/// Scheduler that runs a chain's steps through the execution governor.
///
/// Ready steps launch concurrently on a [`WorkerPool`] bounded by the
/// context's `max_concurrent_operations`. The scheduler is the single
/// writer of the shared variable map, and each step's record is written
/// exactly once, so bindings always read finalized values.
#[derive(Clone, Debug)]
pub struct ChainRunner {
    executor: Arc<ToolExecutor>,
}

impl ChainRunner {
    /// Creates a runner that invokes steps through the supplied governor.
    #[must_use]
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self { executor }
    }

    /// Returns the governor this runner executes steps through.
    #[must_use]
    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    /// Runs a chain to completion under the supplied context.
    ///
    /// The `Err` arm covers build-time rejection only; step failures at run
    /// time are recorded in the returned [`ChainRunResult`].
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] when the chain's dependency graph is
    /// invalid.
    pub async fn run(
        &self,
        chain: &ChainDefinition,
        ctx: &ExecutionContext,
    ) -> Result<ChainRunResult, ChainError> {
        let graph = ChainGraph::build(chain)?;
        let started = Instant::now();
        let steps = chain.steps();
        let total = steps.len();

        info!(chain = chain.id(), run = %ctx.run_id(), steps = total, "chain run started");

        let pool = WorkerPool::new(ctx.limits().effective_concurrency());
        let mut in_degree = graph.in_degree.clone();
        let mut pending: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(position, _)| position)
            .collect();

        let mut in_flight = FuturesUnordered::new();
        let mut outcomes = HashMap::new();
        let mut dispositions: HashMap<String, StepDisposition> = HashMap::with_capacity(total);
        let mut terminal = 0usize;
        let mut halted = false;

        while terminal < total {
            while let Some(position) = pending.pop_front() {
                let step = &steps[position];

                if halted || ctx.is_cancelled() {
                    dispositions.insert(step.step_id().to_owned(), StepDisposition::NotRun);
                    terminal += 1;
                    unblock(&graph, position, &mut in_degree, &mut pending);
                    continue;
                }

                // Bindings and conditions see the variable map as of launch,
                // after every dependency reached a terminal state.
                let vars = ctx.variables().snapshot().await;

                if let Some(condition) = step.condition()
                    && !evaluate_condition(condition, &vars)
                {
                    debug!(chain = chain.id(), step = step.step_id(), "step skipped");
                    ctx.variables().insert(step.step_id(), skip_record()).await;
                    dispositions.insert(step.step_id().to_owned(), StepDisposition::Skipped);
                    terminal += 1;
                    unblock(&graph, position, &mut in_degree, &mut pending);
                    continue;
                }

                let params = resolve_binding(step.binding(), &vars);
                let executor = Arc::clone(&self.executor);
                let tool_id = step.tool_id().clone();
                let step_ctx = ctx.clone();
                let handle =
                    pool.spawn(async move { executor.execute(&tool_id, params, &step_ctx).await });

                in_flight.push(async move {
                    match handle.await {
                        Ok(outcome) => (position, outcome),
                        Err(err) => (
                            position,
                            ToolOutcome::failure(
                                FailureKind::InternalError,
                                format!("step task failed: {err}"),
                            ),
                        ),
                    }
                });
            }

            if terminal >= total {
                break;
            }

            let Some((position, outcome)) = in_flight.next().await else {
                break;
            };
            let step = &steps[position];

            ctx.variables()
                .insert(step.step_id(), step_record(&outcome))
                .await;

            if outcome.is_success() {
                dispositions.insert(step.step_id().to_owned(), StepDisposition::Completed);
            } else {
                dispositions.insert(step.step_id().to_owned(), StepDisposition::Failed);
                if step.error_policy() == ErrorPolicy::StopChain {
                    warn!(
                        chain = chain.id(),
                        step = step.step_id(),
                        "step failed under stop policy, halting chain"
                    );
                    halted = true;
                }
            }

            outcomes.insert(step.step_id().to_owned(), outcome);
            terminal += 1;
            unblock(&graph, position, &mut in_degree, &mut pending);
        }

        for step in steps {
            dispositions
                .entry(step.step_id().to_owned())
                .or_insert(StepDisposition::NotRun);
        }

        let success = !halted && !ctx.is_cancelled();
        let duration = started.elapsed();
        info!(
            chain = chain.id(),
            run = %ctx.run_id(),
            success,
            duration_ms = duration.as_millis() as u64,
            "chain run finished"
        );

        Ok(ChainRunResult {
            success,
            outcomes,
            dispositions,
            duration,
        })
    }
}

fn unblock(
    graph: &ChainGraph,
    position: usize,
    in_degree: &mut [usize],
    pending: &mut VecDeque<usize>,
) {
    for &dependent in &graph.dependents[position] {
        in_degree[dependent] -= 1;
        if in_degree[dependent] == 0 {
            pending.push_back(dependent);
        }
    }
}

/// Record written into the variable map for a step that ran.
fn step_record(outcome: &ToolOutcome) -> Value {
    json!({
        "success": outcome.is_success(),
        "skipped": false,
        "value": outcome.payload().clone(),
        "error": outcome.message(),
    })
}

/// Record written into the variable map for a skipped step.
fn skip_record() -> Value {
    json!({
        "success": false,
        "skipped": true,
        "value": null,
        "error": null,
    })
}
