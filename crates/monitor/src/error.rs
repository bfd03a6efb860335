use std::path::PathBuf;

/// Failure to obtain meetings from the upstream notes source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed meeting cache: {0}")]
    Malformed(String),

    #[error("no meeting source configured: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The run could not start; the ledger was not touched.
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] relay_core::ConfigError),

    #[error("notification setup failed: {0}")]
    Notify(#[from] relay_notify::NotifyError),

    #[error("output setup failed: {0}")]
    Outputs(#[from] relay_outputs::SinkError),
}
