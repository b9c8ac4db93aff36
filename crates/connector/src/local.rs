//! Local process-based connector.
//!
//! Runs commands through `sh -c` on the machine kubeforge itself runs on.
//! Useful for single-node provisioning, dry runs against localhost, and
//! tests; fleet deployments substitute an SSH-backed implementation of the
//! same trait.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ConnectorError;
use crate::{CommandOutput, Connector, ConnectorFactory};

pub struct LocalConnector {
    host: String,
}

impl LocalConnector {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn run(&self, command: &str) -> Result<CommandOutput, ConnectorError> {
        debug!(host = %self.host, %command, "running command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|source| ConnectorError::Spawn {
                host: self.host.clone(),
                source,
            })?;

        let code = output.status.code().ok_or_else(|| ConnectorError::Terminated {
            host: self.host.clone(),
        })?;

        let stdout = String::from_utf8(output.stdout).map_err(|_| ConnectorError::Utf8 {
            host: self.host.clone(),
        })?;
        let stderr = String::from_utf8(output.stderr).map_err(|_| ConnectorError::Utf8 {
            host: self.host.clone(),
        })?;

        Ok(CommandOutput {
            code,
            stdout,
            stderr,
        })
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), ConnectorError> {
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConnectorError::Io {
                host: self.host.clone(),
                source,
            })
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, ConnectorError> {
        tokio::fs::read(path)
            .await
            .map_err(|source| ConnectorError::Io {
                host: self.host.clone(),
                source,
            })
    }
}

/// Factory handing out a [`LocalConnector`] per host.
#[derive(Debug, Default)]
pub struct LocalConnectorFactory;

#[async_trait]
impl ConnectorFactory for LocalConnectorFactory {
    async fn connect(
        &self,
        host: &config::HostSpec,
    ) -> Result<Arc<dyn Connector>, ConnectorError> {
        Ok(Arc::new(LocalConnector::new(host.name.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout_and_exit_code() {
        let conn = LocalConnector::new("local");
        let out = conn.run("echo hello").await.expect("command should run");
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn failing_command_reports_nonzero_code() {
        let conn = LocalConnector::new("local");
        let out = conn.run("exit 3").await.expect("command should run");
        assert!(!out.success());
        assert_eq!(out.code, 3);
    }
}
