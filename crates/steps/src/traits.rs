//! The `Step` trait — the contract every schedulable unit must fulfil.

use async_trait::async_trait;

use config::HostSpec;

use crate::context::RunContext;
use crate::error::StepError;

/// What a successful `execute` (or dry-run) produced.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub message: String,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// An atomic, idempotent unit of work bound to one host at schedule time.
///
/// The engine drives every node and hook through the same contract:
/// 1. `check` — if it errors, the node is Failed in the check phase and
///    `execute` is never called; if it reports `true`, the node is Skipped.
/// 2. `execute` — performs the work and determines Succeeded/Failed.
///
/// In dry-run mode the engine calls `dry_run` instead of the pair; it must
/// not alter target-host state.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Is this step already satisfied on the host?
    ///
    /// The default says "no" — steps without a meaningful probe always run.
    async fn check(&self, _host: &HostSpec, _ctx: &RunContext) -> Result<bool, StepError> {
        Ok(false)
    }

    async fn execute(&self, host: &HostSpec, ctx: &RunContext) -> Result<StepOutput, StepError>;

    /// Non-mutating stand-in for `execute`, used for plan preview.
    async fn dry_run(&self, host: &HostSpec, _ctx: &RunContext) -> StepOutput {
        StepOutput::message(format!("would run '{}' on '{}'", self.name(), host.name))
    }
}
