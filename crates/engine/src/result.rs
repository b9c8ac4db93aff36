//! Execution results — one `StepResult` per node or hook execution,
//! accumulated into the `GraphExecutionResult` returned to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Step-level results
// ---------------------------------------------------------------------------

/// Outcome of one (step, host) execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Which part of the contract produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Check,
    Execute,
    DryRun,
    Hook,
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Check => write!(f, "check"),
            Self::Execute => write!(f, "execute"),
            Self::DryRun => write!(f, "dry_run"),
            Self::Hook => write!(f, "hook"),
        }
    }
}

/// One recorded execution. Immutable once recorded; carries enough to
/// diagnose a failure without re-running: step, host, timestamps, captured
/// output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub host: String,
    pub status: StepStatus,
    pub phase: StepPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepResult {
    pub fn failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

// ---------------------------------------------------------------------------
// Pipeline-level result
// ---------------------------------------------------------------------------

/// Overall outcome of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Every node succeeded (or was legitimately skipped).
    Succeeded,
    /// At least one required node or hook failed.
    Failed,
    /// Failures occurred, but only on ignorable nodes.
    PartialFailure,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::PartialFailure => write!(f, "partial_failure"),
        }
    }
}

/// The sole artifact a run returns to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExecutionResult {
    pub pipeline_name: String,
    pub status: PipelineStatus,
    pub node_results: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl GraphExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.status == PipelineStatus::Succeeded
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.node_results.iter().filter(|r| r.failed())
    }

    pub fn count_with_status(&self, status: StepStatus) -> usize {
        self.node_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }
}
