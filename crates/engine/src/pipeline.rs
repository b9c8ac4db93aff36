//! Pipeline composition and run orchestration.
//!
//! `plan` merges every module's fragment into the final execution graph.
//! `run` executes module-phased: hooks are sequential gates around each
//! module's sub-graph, and a module is only planned once every earlier
//! phase has passed. Since each module's entries depend on the previous
//! module's exits, phased execution admits the same orderings as scheduling
//! the whole merged graph.

use std::fmt;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use config::Inventory;
use steps::{HookEvent, RunContext};

use crate::error::EngineError;
use crate::graph::{ExecutionGraph, GraphBuilder};
use crate::module::{HookSpec, ModuleSpec};
use crate::result::{GraphExecutionResult, PipelineStatus, StepResult};
use crate::runner;
use crate::scheduler::Engine;
use crate::selector::HostSelector;

#[derive(Clone, Default)]
pub struct PipelineSpec {
    pub name: String,
    pub pre_run: Option<HookSpec>,
    pub post_run: Option<HookSpec>,
    pub modules: Vec<ModuleSpec>,
}

impl PipelineSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_module(mut self, module: ModuleSpec) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_pre_run(mut self, hook: HookSpec) -> Self {
        self.pre_run = Some(hook);
        self
    }

    pub fn with_post_run(mut self, hook: HookSpec) -> Self {
        self.post_run = Some(hook);
        self
    }

    /// Merge every module's fragment, in declared order, into the final
    /// execution graph. Deterministic: identical specs and inventory yield
    /// structurally identical graphs.
    ///
    /// # Errors
    /// Planning errors only — duplicate node IDs, a module failing to plan,
    /// or an unresolvable dependency reference. No partial graph escapes.
    pub fn plan(&self, inventory: &Inventory) -> Result<ExecutionGraph, EngineError> {
        let selector = HostSelector::new(inventory);
        let scope = steps::Scope::pipeline(&self.name);

        let mut builder = GraphBuilder::new(&self.name);
        for module in &self.modules {
            let fragment = module
                .plan(&selector, &scope)
                .map_err(|source| EngineError::ModulePlan {
                    module: module.name.clone(),
                    source: Box::new(source),
                })?;
            builder.merge(fragment)?;
        }
        builder.finish()
    }

    /// Run the pipeline to completion.
    ///
    /// Module planning is lazy: once a hook or module fails, later modules
    /// are neither planned nor run. Fragments are still merged into a
    /// cumulative builder as the run proceeds, so a duplicate node ID across
    /// modules aborts exactly as an up-front `plan` would.
    #[instrument(
        name = "pipeline_run",
        skip_all,
        fields(pipeline = %self.name, modules = self.modules.len(), dry_run = ctx.dry_run())
    )]
    pub async fn run(
        &self,
        inventory: &Inventory,
        engine: &Engine,
        ctx: &RunContext,
    ) -> Result<GraphExecutionResult, EngineError> {
        let started_at = Utc::now();
        let selector = HostSelector::new(inventory);
        let scope = steps::Scope::pipeline(&self.name);

        let mut builder = GraphBuilder::new(&self.name);
        let mut results: Vec<StepResult> = Vec::new();
        let mut ignored_failure = false;
        let mut failed = false;

        info!(run_id = %ctx.run_id(), hosts = inventory.len(), "pipeline starting");

        if let Some(hook) = &self.pre_run {
            if self
                .run_gate(hook, HookEvent::PreRun, None, &selector, ctx, &mut results)
                .await
            {
                return Ok(self.finish(PipelineStatus::Failed, results, started_at));
            }
        }

        for module in &self.modules {
            if ctx.is_cancelled() {
                warn!(module = %module.name, "cancellation observed; remaining modules will not run");
                failed = true;
                break;
            }

            if let Some(hook) = &module.pre_run {
                if self
                    .run_gate(hook, HookEvent::PreRun, Some(module), &selector, ctx, &mut results)
                    .await
                {
                    failed = true;
                    break;
                }
            }

            let fragment = module
                .plan(&selector, &scope)
                .map_err(|source| EngineError::ModulePlan {
                    module: module.name.clone(),
                    source: Box::new(source),
                })?;
            builder.merge(fragment.clone())?;

            let graph = ExecutionGraph::from_fragment(&module.name, fragment);
            let module_result = match engine.execute(graph, ctx).await {
                Ok(result) => result,
                Err(EngineError::Cancelled) => {
                    failed = true;
                    break;
                }
                Err(other) => return Err(other),
            };

            results.extend(module_result.node_results);
            match module_result.status {
                PipelineStatus::Succeeded => {}
                PipelineStatus::PartialFailure => ignored_failure = true,
                PipelineStatus::Failed => {
                    error!(module = %module.name, "module failed; remaining modules will not run");
                    failed = true;
                    break;
                }
            }

            if let Some(hook) = &module.post_run {
                if self
                    .run_gate(hook, HookEvent::PostRun, Some(module), &selector, ctx, &mut results)
                    .await
                {
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            if let Some(hook) = &self.post_run {
                if self
                    .run_gate(hook, HookEvent::PostRun, None, &selector, ctx, &mut results)
                    .await
                {
                    failed = true;
                }
            }
        }

        let status = if failed {
            PipelineStatus::Failed
        } else if ignored_failure {
            PipelineStatus::PartialFailure
        } else {
            PipelineStatus::Succeeded
        };

        Ok(self.finish(status, results, started_at))
    }

    /// Run a hook gate; returns `true` if the gate failed.
    async fn run_gate(
        &self,
        hook: &HookSpec,
        event: HookEvent,
        module: Option<&ModuleSpec>,
        selector: &HostSelector<'_>,
        ctx: &RunContext,
        results: &mut Vec<StepResult>,
    ) -> bool {
        let scope = steps::Scope::pipeline(&self.name);
        let (scope, hosts) = match module {
            Some(module) => (
                scope.with_module(&module.name).with_hook(event),
                module.host_set(selector),
            ),
            None => (scope.with_hook(event), selector.all()),
        };

        let hook_ctx = ctx.scoped(scope);
        let hook_results = runner::run_hook(hook, &hosts, &hook_ctx).await;
        let hook_failed = hook_results.iter().any(StepResult::failed);
        results.extend(hook_results);

        if hook_failed {
            error!(
                hook = %event,
                module = module.map(|m| m.name.as_str()).unwrap_or("<pipeline>"),
                "hook failed; phase aborted"
            );
        }
        hook_failed
    }

    fn finish(
        &self,
        status: PipelineStatus,
        results: Vec<StepResult>,
        started_at: chrono::DateTime<Utc>,
    ) -> GraphExecutionResult {
        info!(pipeline = %self.name, %status, results = results.len(), "pipeline finished");
        GraphExecutionResult {
            pipeline_name: self.name.clone(),
            status,
            node_results: results,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

impl fmt::Debug for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineSpec")
            .field("name", &self.name)
            .field("pre_run", &self.pre_run)
            .field("post_run", &self.post_run)
            .field("modules", &self.modules)
            .finish()
    }
}
