//! Typed error type for the connector crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("i/o error on host '{host}': {source}")]
    Io {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot spawn command on host '{host}': {source}")]
    Spawn {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command output on host '{host}' is not valid UTF-8")]
    Utf8 { host: String },

    #[error("command on host '{host}' terminated by signal")]
    Terminated { host: String },
}
