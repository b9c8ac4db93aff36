//! Execution-graph model and the fragment-merge algorithm.
//!
//! Rules enforced on merge:
//! 1. Node IDs must be unique across everything merged so far.
//! 2. Each non-empty fragment's entry nodes gain the previous non-empty
//!    fragment's exit nodes as additional dependencies; empty fragments are
//!    bypassed so the chain links across them.
//! 3. After the final merge every referenced dependency must resolve and the
//!    graph must be acyclic.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use config::HostSpec;
use steps::{Scope, Step};

use crate::error::EngineError;

/// Unique node identity within a merged graph. Deterministic for identical
/// specs: `"<module>/<task>/<step-index>-<step>@<host>"`.
pub type NodeId = String;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One schedulable unit: a step bound to a host, plus the node IDs that must
/// complete successfully first. Immutable once merged into a graph; never
/// deleted, only marked Skipped at execution time.
#[derive(Clone)]
pub struct Node {
    pub id: NodeId,
    pub step: Arc<dyn Step>,
    pub host: HostSpec,
    pub deps: Vec<NodeId>,
    /// A failure of this node does not block its dependents.
    pub ignore_error: bool,
    /// Task-level concurrency cap, shared by every node of the same task and
    /// composed with the engine's global worker pool.
    pub task_gate: Option<Arc<Semaphore>>,
    pub scope: Scope,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("step", &self.step.name())
            .field("host", &self.host.name)
            .field("deps", &self.deps)
            .field("ignore_error", &self.ignore_error)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// A module's own sub-graph, prior to merging. Owned exclusively by the
/// planning module until handed to a [`GraphBuilder`].
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub nodes: HashMap<NodeId, Node>,
    /// Nodes with no dependency inside this fragment.
    pub entries: Vec<NodeId>,
    /// Nodes no other node in this fragment depends on.
    pub exits: Vec<NodeId>,
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

// ---------------------------------------------------------------------------
// ExecutionGraph
// ---------------------------------------------------------------------------

/// The pipeline-wide merged structure. Built by the pipeline during
/// planning, then handed to the engine for execution — the pipeline must not
/// mutate it afterward.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    name: String,
    nodes: HashMap<NodeId, Node>,
    entries: Vec<NodeId>,
    exits: Vec<NodeId>,
}

impl ExecutionGraph {
    /// Treat a single fragment as a standalone graph. Used when a module's
    /// sub-graph runs as its own phase; cross-fragment dependencies are
    /// satisfied by phase ordering, not edges.
    pub fn from_fragment(name: impl Into<String>, fragment: Fragment) -> Self {
        Self {
            name: name.into(),
            nodes: fragment.nodes,
            entries: fragment.entries,
            exits: fragment.exits,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entries(&self) -> &[NodeId] {
        &self.entries
    }

    pub fn exits(&self) -> &[NodeId] {
        &self.exits
    }

    /// Serializable view of the planned graph (the dry-run artifact).
    /// Sorted by node ID so identical plans serialize identically.
    pub fn summary(&self) -> GraphSummary {
        let mut nodes: Vec<NodeSummary> = self
            .nodes
            .values()
            .map(|node| {
                let mut deps = node.deps.clone();
                deps.sort();
                NodeSummary {
                    id: node.id.clone(),
                    step: node.step.name().to_string(),
                    host: node.host.name.clone(),
                    deps,
                    ignore_error: node.ignore_error,
                }
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        GraphSummary {
            name: self.name.clone(),
            entries: self.entries.clone(),
            exits: self.exits.clone(),
            nodes,
        }
    }
}

/// Flat, serializable description of a planned graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub name: String,
    pub entries: Vec<NodeId>,
    pub exits: Vec<NodeId>,
    pub nodes: Vec<NodeSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub step: String,
    pub host: String,
    pub deps: Vec<NodeId>,
    pub ignore_error: bool,
}

// ---------------------------------------------------------------------------
// GraphBuilder — the merge algorithm
// ---------------------------------------------------------------------------

/// Composes independently-planned fragments into one graph.
///
/// Used at two levels with the same semantics: a module chains its tasks'
/// fragments, and the pipeline chains its modules' fragments.
pub struct GraphBuilder {
    name: String,
    nodes: HashMap<NodeId, Node>,
    entries: Vec<NodeId>,
    prev_exits: Vec<NodeId>,
    seen_nonempty: bool,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            entries: Vec::new(),
            prev_exits: Vec::new(),
            seen_nonempty: false,
        }
    }

    /// Merge the next fragment in declared order. An empty fragment is
    /// skipped entirely; the dependency chain links across it.
    ///
    /// # Errors
    /// [`EngineError::DuplicateNodeId`] if the fragment contributes an ID the
    /// builder already holds. Nothing is inserted on error.
    pub fn merge(&mut self, mut fragment: Fragment) -> Result<(), EngineError> {
        if fragment.is_empty() {
            return Ok(());
        }

        for id in fragment.nodes.keys() {
            if self.nodes.contains_key(id) {
                return Err(EngineError::DuplicateNodeId(id.clone()));
            }
        }

        // Wire this fragment's entries onto the previous non-empty
        // fragment's exits, skipping edges that already exist.
        for entry in &fragment.entries {
            if let Some(node) = fragment.nodes.get_mut(entry) {
                for exit in &self.prev_exits {
                    if !node.deps.contains(exit) {
                        node.deps.push(exit.clone());
                    }
                }
            }
        }

        self.nodes.extend(fragment.nodes);

        if !self.seen_nonempty {
            self.entries = dedup_sorted(fragment.entries);
            self.seen_nonempty = true;
        }
        self.prev_exits = dedup_sorted(fragment.exits);

        Ok(())
    }

    /// Finish at fragment granularity — the merged chain becomes one larger
    /// fragment with the first merge's entries and the last merge's exits.
    pub fn into_fragment(self) -> Result<Fragment, EngineError> {
        verify_dependencies(&self.nodes)?;
        Ok(Fragment {
            nodes: self.nodes,
            entries: self.entries,
            exits: self.prev_exits,
        })
    }

    /// Finish at graph granularity, verifying every dependency resolves and
    /// the result is acyclic. An empty graph is valid and executes as a
    /// no-op success.
    pub fn finish(self) -> Result<ExecutionGraph, EngineError> {
        verify_dependencies(&self.nodes)?;
        verify_acyclic(&self.nodes)?;
        Ok(ExecutionGraph {
            name: self.name,
            nodes: self.nodes,
            entries: self.entries,
            exits: self.prev_exits,
        })
    }
}

fn dedup_sorted(mut ids: Vec<NodeId>) -> Vec<NodeId> {
    ids.sort();
    ids.dedup();
    ids
}

fn verify_dependencies(nodes: &HashMap<NodeId, Node>) -> Result<(), EngineError> {
    for node in nodes.values() {
        for dep in &node.deps {
            if !nodes.contains_key(dep) {
                return Err(EngineError::UnresolvedDependency {
                    node: node.id.clone(),
                    dep: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm over the dependency edges; if not every node is visited
/// the input contained a cycle.
fn verify_acyclic(nodes: &HashMap<NodeId, Node>) -> Result<(), EngineError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for node in nodes.values() {
        in_degree.insert(node.id.as_str(), node.deps.len());
        for dep in &node.deps {
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(node.id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0usize;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        if let Some(children) = dependents.get(id) {
            for &child in children {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    if visited != nodes.len() {
        return Err(EngineError::CycleDetected);
    }
    Ok(())
}
