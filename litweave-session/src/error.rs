//! Error types for litweave-session.

use std::path::PathBuf;

use thiserror::Error;

use litweave_core::{ConfigError, ReadError};

/// All errors that can abort a session run.
///
/// Dispatch and plugin failures are not here: they become diagnostics on
/// the run report and the run continues.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The document could not be split into chunks.
    #[error("parse error in {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ReadError,
    },

    /// The session option bag is unusable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    /// Source line of a parse error, if this is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            SessionError::Read { source, .. } => Some(source.line()),
            _ => None,
        }
    }
}

/// Convenience constructor for [`SessionError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SessionError {
    SessionError::Io {
        path: path.into(),
        source,
    }
}
