//! `MockStep` — a test double for `Step`.
//!
//! Useful in unit and integration tests where a real step implementation is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use config::HostSpec;

use crate::context::RunContext;
use crate::error::StepError;
use crate::traits::{Step, StepOutput};

/// Behaviour injected into `MockStep` at construction time.
pub enum MockBehaviour {
    /// Execute succeeds immediately.
    Succeed,
    /// Check reports the step already satisfied; execute must never run.
    AlreadyDone,
    /// Check itself errors out.
    FailCheck(String),
    /// Execute fails.
    FailExecute(String),
    /// Execute succeeds after a fixed delay (for concurrency timing tests).
    SucceedAfter(Duration),
}

/// A mock step that records every host it touches and behaves as programmed.
pub struct MockStep {
    name: String,
    behaviour: MockBehaviour,
    checks: Arc<Mutex<Vec<String>>>,
    executions: Arc<Mutex<Vec<String>>>,
}

impl MockStep {
    pub fn new(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            checks: Arc::new(Mutex::new(Vec::new())),
            executions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn succeeding(name: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::Succeed)
    }

    pub fn already_done(name: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::AlreadyDone)
    }

    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::FailExecute(msg.into()))
    }

    pub fn failing_check(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::FailCheck(msg.into()))
    }

    pub fn delayed(name: impl Into<String>, delay: Duration) -> Self {
        Self::new(name, MockBehaviour::SucceedAfter(delay))
    }

    /// Hosts `check` was called for, in call order.
    pub fn checked_hosts(&self) -> Vec<String> {
        self.checks.lock().expect("mock lock poisoned").clone()
    }

    /// Hosts `execute` was called for, in call order.
    pub fn executed_hosts(&self) -> Vec<String> {
        self.executions.lock().expect("mock lock poisoned").clone()
    }

    pub fn execute_count(&self) -> usize {
        self.executions.lock().expect("mock lock poisoned").len()
    }
}

#[async_trait]
impl Step for MockStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, host: &HostSpec, _ctx: &RunContext) -> Result<bool, StepError> {
        self.checks
            .lock()
            .expect("mock lock poisoned")
            .push(host.name.clone());

        match &self.behaviour {
            MockBehaviour::AlreadyDone => Ok(true),
            MockBehaviour::FailCheck(msg) => Err(StepError::Other(msg.clone())),
            _ => Ok(false),
        }
    }

    async fn execute(&self, host: &HostSpec, _ctx: &RunContext) -> Result<StepOutput, StepError> {
        self.executions
            .lock()
            .expect("mock lock poisoned")
            .push(host.name.clone());

        match &self.behaviour {
            MockBehaviour::Succeed | MockBehaviour::AlreadyDone => {
                Ok(StepOutput::message(format!("{} done", self.name)))
            }
            MockBehaviour::SucceedAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(StepOutput::message(format!("{} done", self.name)))
            }
            MockBehaviour::FailExecute(msg) => Err(StepError::Other(msg.clone())),
            MockBehaviour::FailCheck(msg) => Err(StepError::Other(msg.clone())),
        }
    }
}
