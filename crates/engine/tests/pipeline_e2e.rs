//! End-to-end pipeline scenarios: planning composition, hook gates, and
//! run semantics across modules.

use std::sync::Arc;

use config::{HostSpec, Inventory};
use connector::{ConnectorPool, LocalConnectorFactory};
use engine::{
    Engine, EngineError, HookSpec, ModuleSpec, PipelineSpec, PipelineStatus, StepStatus, TaskSpec,
};
use steps::mock::MockStep;
use steps::{RunContext, StepRegistry};

fn inventory() -> Inventory {
    Inventory::new(vec![
        HostSpec::new("h1", "10.0.0.1").with_roles(["control-plane"]),
        HostSpec::new("h2", "10.0.0.2").with_roles(["worker"]),
        HostSpec::new("h3", "10.0.0.3").with_roles(["worker"]),
    ])
}

fn ctx(pipeline: &str) -> RunContext {
    RunContext::new(
        pipeline,
        Arc::new(ConnectorPool::new(Arc::new(LocalConnectorFactory))),
        Arc::new(StepRegistry::new()),
    )
}

fn task_on(name: &str, step: &Arc<MockStep>, roles: &[&str]) -> TaskSpec {
    TaskSpec::new(name)
        .with_step(Arc::clone(step) as Arc<dyn steps::Step>)
        .on_roles(roles.iter().copied())
}

#[tokio::test]
async fn two_module_pipeline_succeeds_with_cross_module_edges() {
    // ModuleA runs on [h1, h2], ModuleB on [h1, h2, h3]: five executions.
    let step_a = Arc::new(MockStep::succeeding("prepare"));
    let step_b = Arc::new(MockStep::succeeding("deploy"));

    let pipeline = PipelineSpec::new("create-cluster")
        .with_module(ModuleSpec::new("module-a").with_task(
            task_on("task-a1", &step_a, &["control-plane", "worker"]).with_filter(|h| {
                h.name != "h3"
            }),
        ))
        .with_module(
            ModuleSpec::new("module-b")
                .with_task(task_on("task-b1", &step_b, &["control-plane", "worker"])),
        );

    let inv = inventory();

    // Planned graph: every entry of module-b depends on every exit of module-a.
    let graph = pipeline.plan(&inv).expect("plans cleanly");
    assert_eq!(graph.node_count(), 5);

    let a_exits: Vec<String> = graph
        .nodes()
        .filter(|n| n.id.starts_with("module-a/"))
        .map(|n| n.id.clone())
        .collect();
    assert_eq!(a_exits.len(), 2);

    for node in graph.nodes().filter(|n| n.id.starts_with("module-b/")) {
        for exit in &a_exits {
            assert!(
                node.deps.contains(exit),
                "{} should depend on {exit}",
                node.id
            );
        }
    }

    let result = pipeline
        .run(&inv, &Engine::new(), &ctx("create-cluster"))
        .await
        .expect("runs");

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert_eq!(result.node_results.len(), 5);
    assert_eq!(step_a.execute_count(), 2);
    assert_eq!(step_b.execute_count(), 3);
}

#[tokio::test]
async fn failing_pre_run_hook_aborts_before_any_task_and_later_modules_are_never_planned() {
    let hook = Arc::new(MockStep::failing("mount-check", "no space left"));
    let task_step = Arc::new(MockStep::succeeding("install"));
    let later = Arc::new(MockStep::succeeding("configure"));

    let pipeline = PipelineSpec::new("create-cluster")
        .with_module(
            ModuleSpec::new("module-a")
                .with_pre_run(HookSpec::new(Arc::clone(&hook) as Arc<dyn steps::Step>))
                .with_task(task_on("task-a1", &task_step, &["control-plane"])),
        )
        .with_module(
            ModuleSpec::new("module-b").with_task(task_on("task-b1", &later, &["control-plane"])),
        );

    let inv = Inventory::new(vec![HostSpec::new("h1", "10.0.0.1").with_roles(["control-plane"])]);
    let result = pipeline
        .run(&inv, &Engine::new(), &ctx("create-cluster"))
        .await
        .expect("runs");

    assert_eq!(result.status, PipelineStatus::Failed);
    // Exactly one result: the failing hook. No task-level results at all.
    assert_eq!(result.node_results.len(), 1);
    assert_eq!(result.node_results[0].step_name, "mount-check");
    assert_eq!(result.node_results[0].status, StepStatus::Failed);

    assert_eq!(task_step.execute_count(), 0);
    assert_eq!(later.execute_count(), 0);
    assert!(later.checked_hosts().is_empty());
}

#[tokio::test]
async fn post_run_hook_failure_marks_the_run_failed_after_tasks_succeeded() {
    let task_step = Arc::new(MockStep::succeeding("install"));
    let hook = Arc::new(MockStep::failing("health-gate", "apiserver not ready"));
    let later = Arc::new(MockStep::succeeding("next-module"));

    let pipeline = PipelineSpec::new("p")
        .with_module(
            ModuleSpec::new("module-a")
                .with_task(task_on("task-a1", &task_step, &["control-plane"]))
                .with_post_run(HookSpec::new(Arc::clone(&hook) as Arc<dyn steps::Step>)),
        )
        .with_module(
            ModuleSpec::new("module-b").with_task(task_on("task-b1", &later, &["control-plane"])),
        );

    let inv = Inventory::new(vec![HostSpec::new("h1", "10.0.0.1").with_roles(["control-plane"])]);
    let result = pipeline
        .run(&inv, &Engine::new(), &ctx("p"))
        .await
        .expect("runs");

    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(task_step.execute_count(), 1);
    assert_eq!(later.execute_count(), 0);
}

#[tokio::test]
async fn ignorable_task_failure_degrades_to_partial_failure_and_run_continues() {
    let flaky = Arc::new(MockStep::failing("optional-tune", "kernel too old"));
    let later = Arc::new(MockStep::succeeding("deploy"));

    let pipeline = PipelineSpec::new("p")
        .with_module(
            ModuleSpec::new("tuning").with_task(
                task_on("sysctl", &flaky, &["worker"]).ignoring_errors(),
            ),
        )
        .with_module(ModuleSpec::new("deploy").with_task(task_on("apply", &later, &["worker"])));

    let result = pipeline
        .run(&inventory(), &Engine::new(), &ctx("p"))
        .await
        .expect("runs");

    assert_eq!(result.status, PipelineStatus::PartialFailure);
    // Both modules produced results; the failure did not stop the run.
    assert_eq!(later.execute_count(), 2);
}

#[tokio::test]
async fn planning_is_deterministic_for_identical_specs() {
    let make_pipeline = || {
        PipelineSpec::new("p")
            .with_module(ModuleSpec::new("m1").with_task(
                task_on("t1", &Arc::new(MockStep::succeeding("s1")), &["worker"]),
            ))
            .with_module(ModuleSpec::new("m2").with_task(
                task_on("t2", &Arc::new(MockStep::succeeding("s2")), &["control-plane"]),
            ))
    };

    let inv = inventory();
    let first = make_pipeline().plan(&inv).expect("plans").summary();
    let second = make_pipeline().plan(&inv).expect("plans").summary();

    assert_eq!(first, second);
}

#[tokio::test]
async fn duplicate_node_ids_across_modules_abort_planning() {
    // Two modules with the same name planning the same task produce
    // identical node IDs.
    let step = Arc::new(MockStep::succeeding("s"));
    let pipeline = PipelineSpec::new("p")
        .with_module(ModuleSpec::new("same").with_task(task_on("t", &step, &["worker"])))
        .with_module(ModuleSpec::new("same").with_task(task_on("t", &step, &["worker"])));

    let err = pipeline.plan(&inventory()).expect_err("must collide");
    assert!(matches!(err, EngineError::DuplicateNodeId(_)));

    // The lazy run path detects the same collision.
    let err = pipeline
        .run(&inventory(), &Engine::new(), &ctx("p"))
        .await
        .expect_err("must collide");
    assert!(matches!(err, EngineError::DuplicateNodeId(_)));
}

#[tokio::test]
async fn empty_pipeline_is_a_noop_success() {
    let pipeline = PipelineSpec::new("empty");
    let graph = pipeline.plan(&inventory()).expect("plans");
    assert!(graph.is_empty());

    let result = pipeline
        .run(&inventory(), &Engine::new(), &ctx("empty"))
        .await
        .expect("runs");
    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert!(result.node_results.is_empty());
}

#[tokio::test]
async fn dry_run_pipeline_touches_no_step() {
    let step_a = Arc::new(MockStep::succeeding("prepare"));
    let step_b = Arc::new(MockStep::failing("would-fail", "never reached"));
    let hook = Arc::new(MockStep::failing("failing-hook", "never reached"));

    let pipeline = PipelineSpec::new("p")
        .with_pre_run(HookSpec::new(Arc::clone(&hook) as Arc<dyn steps::Step>))
        .with_module(ModuleSpec::new("m1").with_task(task_on("t1", &step_a, &["worker"])))
        .with_module(ModuleSpec::new("m2").with_task(task_on("t2", &step_b, &["worker"])));

    let result = pipeline
        .run(&inventory(), &Engine::new(), &ctx("p").with_dry_run(true))
        .await
        .expect("runs");

    assert_eq!(result.status, PipelineStatus::Succeeded);
    assert_eq!(step_a.execute_count(), 0);
    assert_eq!(step_b.execute_count(), 0);
    assert_eq!(hook.execute_count(), 0);
    // Hook on all 3 hosts plus 2×2 task executions, all simulated.
    assert_eq!(result.node_results.len(), 7);
}

#[tokio::test]
async fn middle_module_planning_nothing_is_bypassed() {
    let first = Arc::new(MockStep::succeeding("first"));
    let last = Arc::new(MockStep::succeeding("last"));

    let pipeline = PipelineSpec::new("p")
        .with_module(ModuleSpec::new("m1").with_task(task_on("t1", &first, &["control-plane"])))
        // Selects no hosts, so the module plans an empty fragment.
        .with_module(ModuleSpec::new("m2").with_task(
            task_on("t2", &Arc::new(MockStep::succeeding("unmatched")), &["etcd"]),
        ))
        .with_module(ModuleSpec::new("m3").with_task(task_on("t3", &last, &["control-plane"])));

    let graph = pipeline.plan(&inventory()).expect("plans");
    assert_eq!(graph.node_count(), 2);

    let m3_entry = graph
        .nodes()
        .find(|n| n.id.starts_with("m3/"))
        .expect("m3 node exists");
    assert_eq!(m3_entry.deps, vec!["m1/t1/0-first@h1".to_string()]);
}
