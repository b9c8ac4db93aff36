//! Module specification and planning.
//!
//! A module groups tasks plus optional pre-run/post-run hook steps. Its plan
//! is a fragment: the tasks' fragments chained in declared order with the
//! same merge algorithm the pipeline applies to modules.

use std::fmt;
use std::sync::Arc;

use config::HostSpec;
use steps::{Scope, Step};

use crate::error::EngineError;
use crate::graph::{Fragment, GraphBuilder};
use crate::selector::HostSelector;
use crate::task::TaskSpec;

/// A single step executed directly against a host set, bypassing the graph.
/// Hooks are sequential phase-gates; `concurrency` defaults to all hosts in
/// one batch.
#[derive(Clone)]
pub struct HookSpec {
    pub step: Arc<dyn Step>,
    pub concurrency: Option<usize>,
}

impl HookSpec {
    pub fn new(step: Arc<dyn Step>) -> Self {
        Self {
            step,
            concurrency: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
}

impl fmt::Debug for HookSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSpec")
            .field("step", &self.step.name())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct ModuleSpec {
    pub name: String,
    pub pre_run: Option<HookSpec>,
    pub post_run: Option<HookSpec>,
    pub tasks: Vec<TaskSpec>,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
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

    /// Chain the tasks' fragments in declared order. Tasks that plan
    /// nothing are bypassed. A module with no planning tasks yields an
    /// empty fragment and contributes no entry/exit linkage.
    pub(crate) fn plan(
        &self,
        selector: &HostSelector<'_>,
        pipeline_scope: &Scope,
    ) -> Result<Fragment, EngineError> {
        let scope = pipeline_scope.with_module(&self.name);
        let mut builder = GraphBuilder::new(&self.name);
        for task in &self.tasks {
            builder.merge(task.plan(&self.name, selector, &scope))?;
        }
        builder.into_fragment()
    }

    /// Union of the host sets required by this module's task selectors,
    /// computed once. Hooks execute against this set.
    pub(crate) fn host_set(&self, selector: &HostSelector<'_>) -> Vec<HostSpec> {
        let mut hosts: Vec<HostSpec> = Vec::new();
        for task in &self.tasks {
            for host in task.select_hosts(selector) {
                if !hosts.iter().any(|h| h.name == host.name) {
                    hosts.push(host);
                }
            }
        }
        hosts.sort_by(|a, b| a.name.cmp(&b.name));
        hosts
    }
}

impl fmt::Debug for ModuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSpec")
            .field("name", &self.name)
            .field("pre_run", &self.pre_run)
            .field("post_run", &self.post_run)
            .field("tasks", &self.tasks)
            .finish()
    }
}
