//! Behavioural tests for the scheduling engine.
//!
//! These use `MockStep` and build graphs by hand, so no remote host (and no
//! real connector) is required.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use config::HostSpec;
use connector::{ConnectorPool, LocalConnectorFactory};
use steps::mock::MockStep;
use steps::{RunContext, Scope, Step, StepRegistry};

use crate::graph::{ExecutionGraph, Fragment, Node};
use crate::result::{PipelineStatus, StepPhase, StepResult, StepStatus};
use crate::scheduler::Engine;
use crate::EngineError;

fn ctx() -> RunContext {
    RunContext::new(
        "test",
        Arc::new(ConnectorPool::new(Arc::new(LocalConnectorFactory))),
        Arc::new(StepRegistry::new()),
    )
}

fn node(id: &str, step: &Arc<MockStep>, host: &str, deps: &[&str]) -> Node {
    Node {
        id: id.to_string(),
        step: Arc::clone(step) as Arc<dyn Step>,
        host: HostSpec::new(host, "10.0.0.1"),
        deps: deps.iter().map(|d| d.to_string()).collect(),
        ignore_error: false,
        task_gate: None,
        scope: Scope::pipeline("test"),
    }
}

fn graph(nodes: Vec<Node>) -> ExecutionGraph {
    let mut fragment = Fragment::empty();
    for n in nodes {
        fragment.nodes.insert(n.id.clone(), n);
    }
    ExecutionGraph::from_fragment("test", fragment)
}

fn result_for<'a>(results: &'a [StepResult], step_name: &str) -> &'a StepResult {
    results
        .iter()
        .find(|r| r.step_name == step_name)
        .unwrap_or_else(|| panic!("no result for step '{step_name}'"))
}

#[tokio::test]
async fn single_node_graph_succeeds() {
    let step = Arc::new(MockStep::succeeding("install"));
    let g = graph(vec![node("n1", &step, "h1", &[])]);

    let result = Engine::new().execute(g, &ctx()).await.expect("runs");

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert_eq!(result.node_results.len(), 1);
    assert_eq!(step.execute_count(), 1);
}

#[tokio::test]
async fn satisfied_check_skips_execute_and_releases_dependents() {
    let done = Arc::new(MockStep::already_done("already-there"));
    let next = Arc::new(MockStep::succeeding("next"));
    let g = graph(vec![
        node("n1", &done, "h1", &[]),
        node("n2", &next, "h1", &["n1"]),
    ]);

    let result = Engine::new().execute(g, &ctx()).await.expect("runs");

    assert_eq!(result.status, PipelineStatus::Succeeded);
    let skipped = result_for(&result.node_results, "already-there");
    assert_eq!(skipped.status, StepStatus::Skipped);
    assert_eq!(skipped.phase, StepPhase::Check);
    assert_eq!(done.execute_count(), 0);
    // The dependent still ran.
    assert_eq!(next.execute_count(), 1);
}

#[tokio::test]
async fn failing_check_is_recorded_in_check_phase() {
    let step = Arc::new(MockStep::failing_check("probe", "port unreachable"));
    let g = graph(vec![node("n1", &step, "h1", &[])]);

    let result = Engine::new().execute(g, &ctx()).await.expect("runs");

    assert_eq!(result.status, PipelineStatus::Failed);
    let failed = result_for(&result.node_results, "probe");
    assert_eq!(failed.status, StepStatus::Failed);
    assert_eq!(failed.phase, StepPhase::Check);
    assert_eq!(step.execute_count(), 0);
}

#[tokio::test]
async fn required_failure_skips_transitive_dependents_but_not_siblings() {
    // boom → after → tail, with ok as an unrelated branch.
    let boom = Arc::new(MockStep::failing("boom", "disk full"));
    let after = Arc::new(MockStep::succeeding("after"));
    let tail = Arc::new(MockStep::succeeding("tail"));
    let ok = Arc::new(MockStep::succeeding("ok"));
    let g = graph(vec![
        node("n-boom", &boom, "h1", &[]),
        node("n-after", &after, "h1", &["n-boom"]),
        node("n-tail", &tail, "h1", &["n-after"]),
        node("n-ok", &ok, "h2", &[]),
    ]);

    let result = Engine::new().execute(g, &ctx()).await.expect("runs");

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(result.node_results.len(), 4);

    assert_eq!(result_for(&result.node_results, "boom").status, StepStatus::Failed);
    assert_eq!(result_for(&result.node_results, "after").status, StepStatus::Skipped);
    assert_eq!(result_for(&result.node_results, "tail").status, StepStatus::Skipped);
    assert_eq!(result_for(&result.node_results, "ok").status, StepStatus::Succeeded);

    assert_eq!(after.execute_count(), 0);
    assert_eq!(tail.execute_count(), 0);
    assert_eq!(ok.execute_count(), 1);
}

#[tokio::test]
async fn ignorable_failure_yields_partial_failure_and_releases_dependents() {
    let flaky = Arc::new(MockStep::failing("optional-tune", "sysctl missing"));
    let next = Arc::new(MockStep::succeeding("next"));

    let mut flaky_node = node("n1", &flaky, "h1", &[]);
    flaky_node.ignore_error = true;
    let g = graph(vec![flaky_node, node("n2", &next, "h1", &["n1"])]);

    let result = Engine::new().execute(g, &ctx()).await.expect("runs");

    assert_eq!(result.status, PipelineStatus::PartialFailure);
    assert_eq!(result_for(&result.node_results, "optional-tune").status, StepStatus::Failed);
    assert_eq!(result_for(&result.node_results, "next").status, StepStatus::Succeeded);
    assert_eq!(next.execute_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn task_gate_bounds_concurrent_hosts() {
    const DELAY: Duration = Duration::from_millis(100);

    let step = Arc::new(MockStep::delayed("slow", DELAY));
    let gate = Arc::new(Semaphore::new(2));

    let mut nodes = Vec::new();
    for host in ["h1", "h2", "h3"] {
        let mut n = node(&format!("n-{host}"), &step, host, &[]);
        n.task_gate = Some(Arc::clone(&gate));
        nodes.push(n);
    }

    let start = tokio::time::Instant::now();
    let result = Engine::new().execute(graph(nodes), &ctx()).await.expect("runs");
    let elapsed = start.elapsed();

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert_eq!(step.execute_count(), 3);
    // Two dispatch windows: the cap of 2 forces the third host to wait for
    // a permit, so wall-clock is at least 2×DELAY but under 3×DELAY.
    assert!(elapsed >= DELAY * 2, "elapsed {elapsed:?} < 2×delay");
    assert!(elapsed < DELAY * 3, "elapsed {elapsed:?} ≥ 3×delay");
}

#[tokio::test]
async fn dry_run_produces_results_without_executing() {
    let a = Arc::new(MockStep::succeeding("install"));
    let b = Arc::new(MockStep::failing("would-fail", "never reached"));
    let g = graph(vec![
        node("n1", &a, "h1", &[]),
        node("n2", &b, "h1", &["n1"]),
    ]);

    let result = Engine::new()
        .execute(g, &ctx().with_dry_run(true))
        .await
        .expect("runs");

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert_eq!(result.node_results.len(), 2);
    assert!(result
        .node_results
        .iter()
        .all(|r| r.phase == StepPhase::DryRun && r.status == StepStatus::Succeeded));
    assert_eq!(a.execute_count(), 0);
    assert_eq!(b.execute_count(), 0);
    assert!(a.checked_hosts().is_empty());
}

#[tokio::test]
async fn cancellation_before_dispatch_is_an_engine_error() {
    let token = CancellationToken::new();
    token.cancel();
    let cancelled_ctx = ctx().with_cancel(token);

    let step = Arc::new(MockStep::succeeding("never"));
    let g = graph(vec![node("n1", &step, "h1", &[])]);

    let err = Engine::new()
        .execute(g, &cancelled_ctx)
        .await
        .expect_err("must refuse to start");
    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(step.execute_count(), 0);
}

#[tokio::test]
async fn empty_graph_is_a_noop_success() {
    let g = ExecutionGraph::from_fragment("noop", Fragment::empty());
    let result = Engine::new().execute(g, &ctx()).await.expect("runs");

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert!(result.node_results.is_empty());
}

#[tokio::test]
async fn diamond_failure_keeps_the_successful_parent_result() {
    //   a   b      a fails, b succeeds, join depends on both.
    //    \ /
    //    join
    let a = Arc::new(MockStep::failing("a", "boom"));
    let b = Arc::new(MockStep::succeeding("b"));
    let join = Arc::new(MockStep::succeeding("join"));
    let g = graph(vec![
        node("n-a", &a, "h1", &[]),
        node("n-b", &b, "h2", &[]),
        node("n-join", &join, "h1", &["n-a", "n-b"]),
    ]);

    let result = Engine::new().execute(g, &ctx()).await.expect("runs");

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(result_for(&result.node_results, "b").status, StepStatus::Succeeded);
    assert_eq!(result_for(&result.node_results, "join").status, StepStatus::Skipped);
    assert_eq!(join.execute_count(), 0);
}
