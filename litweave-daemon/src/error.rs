use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime, session table and client protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin registry error: {0}")]
    Registry(#[from] litweave_core::RegistryError),

    #[error("{0}")]
    Session(#[from] litweave_session::SessionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    /// The daemon answered with `ok: false`.
    #[error("{0}")]
    Remote(String),

    #[error("job timed out after {millis}ms; its session was discarded")]
    Timeout { millis: u64 },

    #[error("daemon is not running (nothing listening on {endpoint})")]
    DaemonNotRunning { endpoint: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
