//! `CommandStep` — a step that runs shell commands through the host's connector.
//!
//! The one concrete step shipped with the core. An optional check command
//! probes whether the step is already satisfied (exit 0 ⇒ satisfied); the
//! execute command performs the work.

use async_trait::async_trait;
use tracing::debug;

use config::HostSpec;

use crate::context::RunContext;
use crate::error::StepError;
use crate::traits::{Step, StepOutput};

pub struct CommandStep {
    name: String,
    check_command: Option<String>,
    execute_command: String,
}

impl CommandStep {
    pub fn new(name: impl Into<String>, execute_command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            check_command: None,
            execute_command: execute_command.into(),
        }
    }

    /// Probe command; exit 0 means the step is already satisfied.
    pub fn with_check(mut self, check_command: impl Into<String>) -> Self {
        self.check_command = Some(check_command.into());
        self
    }

    pub fn execute_command(&self) -> &str {
        &self.execute_command
    }
}

#[async_trait]
impl Step for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, host: &HostSpec, ctx: &RunContext) -> Result<bool, StepError> {
        let Some(check) = &self.check_command else {
            return Ok(false);
        };

        if ctx.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let conn = ctx.connector(host).await?;
        let output = conn.run(check).await?;
        debug!(step = %self.name, host = %host.name, satisfied = output.success(), "check");
        Ok(output.success())
    }

    async fn execute(&self, host: &HostSpec, ctx: &RunContext) -> Result<StepOutput, StepError> {
        if ctx.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let conn = ctx.connector(host).await?;
        let output = conn.run(&self.execute_command).await?;

        if !output.success() {
            return Err(StepError::Command {
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        Ok(StepOutput {
            message: format!("'{}' succeeded", self.name),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn dry_run(&self, host: &HostSpec, _ctx: &RunContext) -> StepOutput {
        StepOutput::message(format!(
            "would run `{}` on '{}'",
            self.execute_command, host.name
        ))
    }
}
