//! Engine-level error types.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors produced by the orchestration core (planning + scheduling).
///
/// Step failures are never surfaced here — they are recorded as Failed
/// results and handled by dependency propagation.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Planning errors ------

    /// Two fragments contributed the same node ID during a merge.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(NodeId),

    /// A dependency references a node that does not exist after merge.
    #[error("node '{node}' depends on unknown node '{dep}'")]
    UnresolvedDependency { node: NodeId, dep: NodeId },

    /// The merged graph is not acyclic.
    #[error("execution graph contains a cycle")]
    CycleDetected,

    /// A module's plan step failed.
    #[error("planning module '{module}' failed: {source}")]
    ModulePlan {
        module: String,
        #[source]
        source: Box<EngineError>,
    },

    // ------ Execution errors ------

    /// The run was cancelled before any node was dispatched.
    #[error("run cancelled before any node was dispatched")]
    Cancelled,

    /// Worker-pool infrastructure failure, distinct from any node's result.
    #[error("worker failure: {0}")]
    Worker(String),
}
