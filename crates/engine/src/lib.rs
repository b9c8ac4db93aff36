//! `engine` crate — the orchestration core.
//!
//! Compiles declarative pipeline specifications into a merged execution
//! graph and schedules it across hosts with bounded concurrency:
//! pipeline → module → task → step, planned leaf-to-root into fragments,
//! merged into one graph, and walked by the scheduling engine.

pub mod error;
pub mod graph;
pub mod module;
pub mod pipeline;
pub mod result;
mod runner;
pub mod scheduler;
pub mod selector;
pub mod task;

pub use error::EngineError;
pub use graph::{ExecutionGraph, Fragment, GraphBuilder, GraphSummary, Node, NodeId, NodeSummary};
pub use module::{HookSpec, ModuleSpec};
pub use pipeline::PipelineSpec;
pub use result::{GraphExecutionResult, PipelineStatus, StepPhase, StepResult, StepStatus};
pub use scheduler::{Engine, DEFAULT_WORKER_POOL};
pub use selector::{HostFilter, HostSelector};
pub use task::{TaskSpec, DEFAULT_TASK_CONCURRENCY};

#[cfg(test)]
mod scheduler_tests;
