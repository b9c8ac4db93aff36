//! Step-level error type.

use thiserror::Error;

/// Errors returned by a step's `check` or `execute` method.
///
/// The engine never aborts on these — it records them as Failed results and
/// lets dependency propagation decide what still runs.
#[derive(Debug, Error)]
pub enum StepError {
    /// The transport to the host failed.
    #[error(transparent)]
    Connector(#[from] connector::ConnectorError),

    /// The remote command ran and exited non-zero.
    #[error("command exited with status {code}")]
    Command {
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// The run was cancelled before or during the call.
    #[error("step cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
