//! `connector` crate — executing commands and transferring files on a named host.
//!
//! Steps depend on this abstraction; the engine/pipeline/module/task layers
//! do not. Only a local implementation ships here — a real SSH transport is
//! another implementation of the same trait.

pub mod error;
pub mod local;
pub mod pool;

use async_trait::async_trait;
use std::path::Path;

pub use error::ConnectorError;
pub use local::{LocalConnector, LocalConnectorFactory};
pub use pool::ConnectorPool;

/// Captured outcome of one remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// An established session with one host.
///
/// A connector is acquired once per host per run (see [`ConnectorPool`]) and
/// reused by every step targeting that host within the run.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Run a shell command on the host and capture its output.
    async fn run(&self, command: &str) -> Result<CommandOutput, ConnectorError>;

    /// Write a file on the host.
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), ConnectorError>;

    /// Read a file from the host.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, ConnectorError>;
}

/// Opens a [`Connector`] session for a host.
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    async fn connect(
        &self,
        host: &config::HostSpec,
    ) -> Result<std::sync::Arc<dyn Connector>, ConnectorError>;
}
