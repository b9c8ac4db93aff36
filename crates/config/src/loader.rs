//! Loading a cluster file from disk.

use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::models::ClusterSpec;

/// Read, default, and validate a JSON cluster file.
///
/// The returned spec is fully populated: every consumer downstream may assume
/// optional fields are resolved and role groups are folded into host roles.
pub fn load_cluster_spec(path: impl AsRef<Path>) -> Result<ClusterSpec, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let spec: ClusterSpec = serde_json::from_str(&raw)?;
    let spec = spec.defaulted();
    spec.validate()?;

    debug!(
        cluster = %spec.name,
        hosts = spec.hosts.len(),
        "loaded cluster spec"
    );

    Ok(spec)
}
