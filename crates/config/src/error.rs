//! Typed error type for the config crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read cluster file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cluster file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cluster has no hosts")]
    EmptyInventory,

    #[error("duplicate host name '{0}'")]
    DuplicateHost(String),

    #[error("host '{0}' has an empty address")]
    MissingAddress(String),

    #[error("role group '{role}' references unknown host '{host}'")]
    UnknownGroupHost { role: String, host: String },
}
