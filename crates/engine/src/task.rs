//! Task specification and planning.
//!
//! A task applies an ordered step list across a selected set of hosts.
//! Planning turns it into one sequential node chain per host; the chains
//! share a concurrency gate bounding cross-host overlap.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::sync::Semaphore;

use config::HostSpec;
use steps::{Scope, Step};

use crate::graph::{Fragment, Node, NodeId};
use crate::selector::{HostFilter, HostSelector};

/// Hosts a task touches concurrently when no explicit cap is configured.
pub const DEFAULT_TASK_CONCURRENCY: usize = 5;

#[derive(Clone)]
pub struct TaskSpec {
    pub name: String,
    pub steps: Vec<Arc<dyn Step>>,
    /// Union semantics: a host matching any role is selected.
    pub run_on_roles: BTreeSet<String>,
    pub filter: Option<HostFilter>,
    pub concurrency: Option<usize>,
    /// A failing host/step reports failure but does not block dependents.
    pub ignore_error: bool,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            run_on_roles: BTreeSet::new(),
            filter: None,
            concurrency: None,
            ignore_error: false,
        }
    }

    pub fn with_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn on_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_on_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&HostSpec) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn ignoring_errors(mut self) -> Self {
        self.ignore_error = true;
        self
    }

    pub(crate) fn select_hosts(&self, selector: &HostSelector<'_>) -> Vec<HostSpec> {
        selector.select(&self.run_on_roles, self.filter.as_ref())
    }

    /// Plan this task into a fragment: one node chain per selected host.
    /// A task with no steps or no matching hosts plans an empty fragment.
    pub(crate) fn plan(&self, module: &str, selector: &HostSelector<'_>, scope: &Scope) -> Fragment {
        let hosts = self.select_hosts(selector);
        if hosts.is_empty() || self.steps.is_empty() {
            return Fragment::empty();
        }

        let cap = self
            .concurrency
            .unwrap_or(DEFAULT_TASK_CONCURRENCY)
            .max(1);
        let gate = Arc::new(Semaphore::new(cap));
        let task_scope = scope.with_task(&self.name);

        let mut nodes: HashMap<NodeId, Node> = HashMap::new();
        let mut entries = Vec::with_capacity(hosts.len());
        let mut exits = Vec::with_capacity(hosts.len());

        for host in hosts {
            let mut prev: Option<NodeId> = None;
            for (index, step) in self.steps.iter().enumerate() {
                let id = format!(
                    "{module}/{task}/{index}-{step}@{host}",
                    task = self.name,
                    step = step.name(),
                    host = host.name,
                );

                let deps: Vec<NodeId> = prev.take().into_iter().collect();
                if deps.is_empty() {
                    entries.push(id.clone());
                }
                if index == self.steps.len() - 1 {
                    exits.push(id.clone());
                }

                nodes.insert(
                    id.clone(),
                    Node {
                        id: id.clone(),
                        step: Arc::clone(step),
                        host: host.clone(),
                        deps,
                        ignore_error: self.ignore_error,
                        task_gate: Some(Arc::clone(&gate)),
                        scope: task_scope.clone(),
                    },
                );
                prev = Some(id);
            }
        }

        Fragment {
            nodes,
            entries,
            exits,
        }
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("run_on_roles", &self.run_on_roles)
            .field("concurrency", &self.concurrency)
            .field("ignore_error", &self.ignore_error)
            .finish_non_exhaustive()
    }
}
