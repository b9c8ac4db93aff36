//! `steps` crate — the `Step` capability and its execution context.
//!
//! A step is an atomic, idempotent unit of work bound to one host:
//! `check` answers "is it already satisfied?", `execute` performs it.
//! Anything implementing [`Step`] can be scheduled by the engine; the
//! engine is agnostic to what the unit actually does.

pub mod command;
pub mod context;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use command::CommandStep;
pub use context::{HookEvent, RunContext, Scope};
pub use error::StepError;
pub use registry::StepRegistry;
pub use traits::{Step, StepOutput};
