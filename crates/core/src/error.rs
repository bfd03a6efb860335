use std::path::PathBuf;

use thiserror::Error;

/// Malformed or incomplete configuration. Always fatal: the monitor
/// aborts before contacting the upstream source.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    EnvVar(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
