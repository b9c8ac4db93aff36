//! The Check/Execute contract around one (step, host), shared by the
//! scheduling engine and by hook gates.

use std::sync::Arc;

use chrono::Utc;
use futures::future;
use tracing::{error, info, warn};

use config::HostSpec;
use steps::{RunContext, Step, StepError};

use crate::module::HookSpec;
use crate::result::{StepPhase, StepResult, StepStatus};

/// Drive one step against one host:
/// - dry-run mode substitutes the step's non-mutating `dry_run` path;
/// - a `check` error records a Failed result in the check phase and
///   `execute` is never invoked;
/// - `check` reporting done records a Skipped result;
/// - otherwise `execute` determines the outcome.
///
/// `success_phase` tags graph executions as `Execute` and hook executions
/// as `Hook`.
pub(crate) async fn run_step(
    step: &Arc<dyn Step>,
    host: &HostSpec,
    ctx: &RunContext,
    success_phase: StepPhase,
) -> StepResult {
    let started_at = Utc::now();
    let base = StepResult {
        step_name: step.name().to_string(),
        host: host.name.clone(),
        status: StepStatus::Succeeded,
        phase: success_phase,
        error: None,
        message: String::new(),
        stdout: String::new(),
        stderr: String::new(),
        started_at,
        finished_at: started_at,
    };

    if ctx.dry_run() {
        let output = step.dry_run(host, ctx).await;
        info!(
            scope = %ctx.scope,
            host = %host.name,
            step = step.name(),
            "dry_run"
        );
        return StepResult {
            phase: StepPhase::DryRun,
            message: output.message,
            stdout: output.stdout,
            stderr: output.stderr,
            finished_at: Utc::now(),
            ..base
        };
    }

    if ctx.is_cancelled() {
        return StepResult {
            status: StepStatus::Failed,
            error: Some(StepError::Cancelled.to_string()),
            finished_at: Utc::now(),
            ..base
        };
    }

    match step.check(host, ctx).await {
        Err(err) => {
            warn!(
                scope = %ctx.scope,
                host = %host.name,
                step = step.name(),
                error = %err,
                "check_failed"
            );
            StepResult {
                status: StepStatus::Failed,
                phase: StepPhase::Check,
                error: Some(err.to_string()),
                finished_at: Utc::now(),
                ..base
            }
        }
        Ok(true) => {
            info!(
                scope = %ctx.scope,
                host = %host.name,
                step = step.name(),
                "already_satisfied"
            );
            StepResult {
                status: StepStatus::Skipped,
                phase: StepPhase::Check,
                message: "already satisfied".to_string(),
                finished_at: Utc::now(),
                ..base
            }
        }
        Ok(false) => match step.execute(host, ctx).await {
            Ok(output) => {
                info!(
                    scope = %ctx.scope,
                    host = %host.name,
                    step = step.name(),
                    "step_succeeded"
                );
                StepResult {
                    message: output.message,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    finished_at: Utc::now(),
                    ..base
                }
            }
            Err(err) => {
                let (stdout, stderr) = match &err {
                    StepError::Command { stdout, stderr, .. } => {
                        (stdout.clone(), stderr.clone())
                    }
                    _ => (String::new(), String::new()),
                };
                error!(
                    scope = %ctx.scope,
                    host = %host.name,
                    step = step.name(),
                    error = %err,
                    "step_failed"
                );
                StepResult {
                    status: StepStatus::Failed,
                    error: Some(err.to_string()),
                    stdout,
                    stderr,
                    finished_at: Utc::now(),
                    ..base
                }
            }
        },
    }
}

/// Execute a hook step against a host set in batches. A batch with a
/// failure stops later batches from dispatching; results already produced
/// are preserved.
pub(crate) async fn run_hook(
    hook: &HookSpec,
    hosts: &[HostSpec],
    ctx: &RunContext,
) -> Vec<StepResult> {
    if hosts.is_empty() {
        return Vec::new();
    }

    let batch_size = hook.concurrency.unwrap_or(hosts.len()).max(1);
    let mut results = Vec::with_capacity(hosts.len());

    for batch in hosts.chunks(batch_size) {
        let executions = batch
            .iter()
            .map(|host| run_step(&hook.step, host, ctx, StepPhase::Hook));
        let batch_results = future::join_all(executions).await;

        let batch_failed = batch_results.iter().any(StepResult::failed);
        results.extend(batch_results);
        if batch_failed {
            break;
        }
    }

    results
}
