//! The scheduling engine — walks a merged execution graph with a bounded
//! worker pool.
//!
//! Nodes whose dependencies have all completed successfully are "ready" and
//! dispatched concurrently; a required failure settles every transitive
//! dependent as Skipped while unrelated branches keep running. The global
//! worker pool and each task's own gate compose: a dispatched execution
//! holds a permit from both.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use steps::RunContext;

use crate::error::EngineError;
use crate::graph::{ExecutionGraph, Node, NodeId};
use crate::result::{GraphExecutionResult, PipelineStatus, StepPhase, StepResult, StepStatus};
use crate::runner;

/// Worker-pool size when none is configured.
pub const DEFAULT_WORKER_POOL: usize = 8;

#[derive(Debug, Clone)]
pub struct Engine {
    workers: usize,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_WORKER_POOL,
        }
    }

    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Execute the graph to completion and return the accumulated result.
    ///
    /// # Errors
    /// - [`EngineError::Cancelled`] if the run was cancelled before any node
    ///   was dispatched. Cancellation observed later is recorded in results
    ///   instead: in-flight nodes finish (typically as Failed), everything
    ///   undispatched settles as Skipped, and the overall status is Failed.
    /// - [`EngineError::Worker`] if a worker itself dies (panic/abort),
    ///   distinct from any node's own failure.
    #[instrument(
        name = "graph_execute",
        skip_all,
        fields(graph = %graph.name(), nodes = graph.node_count(), dry_run = ctx.dry_run())
    )]
    pub async fn execute(
        &self,
        graph: ExecutionGraph,
        ctx: &RunContext,
    ) -> Result<GraphExecutionResult, EngineError> {
        let started_at = Utc::now();

        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        if graph.is_empty() {
            return Ok(GraphExecutionResult {
                pipeline_name: graph.name().to_string(),
                status: PipelineStatus::Succeeded,
                node_results: Vec::new(),
                started_at,
                finished_at: Utc::now(),
            });
        }

        info!(workers = self.workers, "executing graph");

        // Dependency bookkeeping.
        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(graph.node_count());
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in graph.nodes() {
            in_degree.insert(node.id.clone(), node.deps.len());
            for dep in &node.deps {
                dependents.entry(dep.clone()).or_default().push(node.id.clone());
            }
        }

        let mut ready: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(id, _)| id.clone())
            .collect();
        ready.sort();

        let pool = Arc::new(Semaphore::new(self.workers));
        let mut join_set: JoinSet<(NodeId, StepResult)> = JoinSet::new();
        let mut settled: HashSet<NodeId> = HashSet::with_capacity(graph.node_count());
        let mut node_results: Vec<StepResult> = Vec::with_capacity(graph.node_count());
        let mut required_failure = false;
        let mut ignored_failure = false;
        let mut cancelled = false;

        loop {
            if !cancelled && ctx.is_cancelled() {
                cancelled = true;
                warn!("cancellation observed; no further nodes will be dispatched");
            }

            if !cancelled {
                for id in std::mem::take(&mut ready) {
                    let Some(node) = graph.get(&id) else { continue };
                    let node = node.clone();
                    let pool = Arc::clone(&pool);
                    let node_ctx = ctx.scoped(node.scope.clone());
                    join_set.spawn(async move {
                        // Task gate first so waiting on it does not occupy
                        // a global worker slot.
                        let _gate = match &node.task_gate {
                            Some(gate) => Arc::clone(gate).acquire_owned().await.ok(),
                            None => None,
                        };
                        let _slot = pool.acquire_owned().await.ok();
                        let result =
                            runner::run_step(&node.step, &node.host, &node_ctx, StepPhase::Execute)
                                .await;
                        (node.id.clone(), result)
                    });
                }
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (id, result) = joined.map_err(|err| EngineError::Worker(err.to_string()))?;

            settled.insert(id.clone());
            let ignorable = graph.get(&id).map(|n| n.ignore_error).unwrap_or(false);
            let status = result.status;
            node_results.push(result);

            match status {
                // A Skipped worker result means the check reported the step
                // already satisfied — dependents may proceed.
                StepStatus::Succeeded | StepStatus::Skipped => {
                    release_dependents(&id, &dependents, &mut in_degree, &settled, &mut ready);
                }
                StepStatus::Failed if ignorable => {
                    ignored_failure = true;
                    release_dependents(&id, &dependents, &mut in_degree, &settled, &mut ready);
                }
                StepStatus::Failed => {
                    required_failure = true;
                    skip_descendants(&id, &graph, &dependents, &mut settled, &mut node_results);
                }
            }
        }

        if cancelled {
            required_failure = true;
            let mut leftover: Vec<&Node> = graph
                .nodes()
                .filter(|n| !settled.contains(&n.id))
                .collect();
            leftover.sort_by(|a, b| a.id.cmp(&b.id));
            for node in leftover {
                node_results.push(skip_result(node, "run cancelled"));
            }
        } else if settled.len() != graph.node_count() {
            // Every acyclic graph drains completely; leftovers mean a cycle
            // slipped past planning.
            return Err(EngineError::CycleDetected);
        }

        let status = if required_failure {
            PipelineStatus::Failed
        } else if ignored_failure {
            PipelineStatus::PartialFailure
        } else {
            PipelineStatus::Succeeded
        };

        info!(%status, results = node_results.len(), "graph execution finished");

        Ok(GraphExecutionResult {
            pipeline_name: graph.name().to_string(),
            status,
            node_results,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn release_dependents(
    id: &str,
    dependents: &HashMap<NodeId, Vec<NodeId>>,
    in_degree: &mut HashMap<NodeId, usize>,
    settled: &HashSet<NodeId>,
    ready: &mut Vec<NodeId>,
) {
    let Some(children) = dependents.get(id) else {
        return;
    };
    for child in children {
        if settled.contains(child) {
            continue;
        }
        if let Some(degree) = in_degree.get_mut(child) {
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                ready.push(child.clone());
            }
        }
    }
}

/// Settle every transitive dependent of a failed (or skipped-by-failure)
/// node as Skipped, without executing it.
fn skip_descendants(
    failed: &str,
    graph: &ExecutionGraph,
    dependents: &HashMap<NodeId, Vec<NodeId>>,
    settled: &mut HashSet<NodeId>,
    node_results: &mut Vec<StepResult>,
) {
    let mut stack: Vec<NodeId> = dependents.get(failed).cloned().unwrap_or_default();
    while let Some(id) = stack.pop() {
        if !settled.insert(id.clone()) {
            continue;
        }
        if let Some(node) = graph.get(&id) {
            node_results.push(skip_result(
                node,
                &format!("dependency '{failed}' did not succeed"),
            ));
        }
        if let Some(children) = dependents.get(&id) {
            stack.extend(children.iter().cloned());
        }
    }
}

fn skip_result(node: &Node, reason: &str) -> StepResult {
    let now = Utc::now();
    StepResult {
        step_name: node.step.name().to_string(),
        host: node.host.name.clone(),
        status: StepStatus::Skipped,
        phase: StepPhase::Execute,
        error: None,
        message: format!("skipped: {reason}"),
        stdout: String::new(),
        stderr: String::new(),
        started_at: now,
        finished_at: now,
    }
}
