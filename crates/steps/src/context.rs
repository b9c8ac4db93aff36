//! Shared per-run context and the layered logging scope.
//!
//! Defined here (in the steps crate) so both the engine and individual step
//! implementations can import it without a circular dependency.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use config::HostSpec;
use connector::{Connector, ConnectorError, ConnectorPool};

use crate::registry::StepRegistry;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Which phase a hook guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    PreRun,
    PostRun,
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreRun => write!(f, "pre_run"),
            Self::PostRun => write!(f, "post_run"),
        }
    }
}

/// Layered observability labels carried by every hook and step execution:
/// pipeline, then module, then task (or hook event). Informational only —
/// never consulted for control flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub pipeline: String,
    pub module: Option<String>,
    pub task: Option<String>,
    pub hook_event: Option<HookEvent>,
}

impl Scope {
    pub fn pipeline(name: impl Into<String>) -> Self {
        Self {
            pipeline: name.into(),
            ..Self::default()
        }
    }

    pub fn with_module(&self, name: impl Into<String>) -> Self {
        Self {
            module: Some(name.into()),
            ..self.clone()
        }
    }

    pub fn with_task(&self, name: impl Into<String>) -> Self {
        Self {
            task: Some(name.into()),
            ..self.clone()
        }
    }

    pub fn with_hook(&self, event: HookEvent) -> Self {
        Self {
            hook_event: Some(event),
            ..self.clone()
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pipeline)?;
        if let Some(module) = &self.module {
            write!(f, "/{module}")?;
        }
        if let Some(task) = &self.task {
            write!(f, "/{task}")?;
        }
        if let Some(event) = &self.hook_event {
            write!(f, ":{event}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

struct Shared {
    run_id: Uuid,
    dry_run: bool,
    cancel: CancellationToken,
    connectors: Arc<ConnectorPool>,
    registry: Arc<StepRegistry>,
}

/// Everything a step execution can reach: run identity, the per-run
/// connector pool, the injected step registry, the cancellation signal, and
/// its own [`Scope`]. Cheap to clone; the scope is the only per-clone state.
#[derive(Clone)]
pub struct RunContext {
    shared: Arc<Shared>,
    pub scope: Scope,
}

impl RunContext {
    pub fn new(
        pipeline: impl Into<String>,
        connectors: Arc<ConnectorPool>,
        registry: Arc<StepRegistry>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                run_id: Uuid::new_v4(),
                dry_run: false,
                cancel: CancellationToken::new(),
                connectors,
                registry,
            }),
            scope: Scope::pipeline(pipeline),
        }
    }

    /// Switch the run into dry-run mode. Must be called before execution
    /// starts; contexts already handed out keep the previous mode.
    pub fn with_dry_run(self, dry_run: bool) -> Self {
        let shared = Arc::new(Shared {
            run_id: self.shared.run_id,
            dry_run,
            cancel: self.shared.cancel.clone(),
            connectors: Arc::clone(&self.shared.connectors),
            registry: Arc::clone(&self.shared.registry),
        });
        Self {
            shared,
            scope: self.scope,
        }
    }

    pub fn with_cancel(self, cancel: CancellationToken) -> Self {
        let shared = Arc::new(Shared {
            run_id: self.shared.run_id,
            dry_run: self.shared.dry_run,
            cancel,
            connectors: Arc::clone(&self.shared.connectors),
            registry: Arc::clone(&self.shared.registry),
        });
        Self {
            shared,
            scope: self.scope,
        }
    }

    /// Derive a context carrying a more specific scope.
    pub fn scoped(&self, scope: Scope) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            scope,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.shared.run_id
    }

    pub fn dry_run(&self) -> bool {
        self.shared.dry_run
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.shared.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.shared.registry
    }

    /// The host's session from the per-run pool, established on first use.
    pub async fn connector(&self, host: &HostSpec) -> Result<Arc<dyn Connector>, ConnectorError> {
        self.shared.connectors.get(host).await
    }
}
