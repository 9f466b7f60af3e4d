//! Error types for litweave-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::registry::PluginKind;

/// Errors raised while splitting a document into chunks.
///
/// Both variants abort the single read they occur in; they never touch
/// state outside the reader.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Unbalanced delimiters (a second start token, or an end token with no
    /// open chunk).
    #[error("{message} before line {line}")]
    Parse { line: usize, message: String },

    /// The document ended while a code chunk was still open.
    #[error("code chunk opened on line {line} is never closed")]
    Unterminated { line: usize },

    /// The underlying line source failed.
    #[error("failed to read line {line}: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Physical line number the error points at.
    pub fn line(&self) -> usize {
        match self {
            ReadError::Parse { line, .. }
            | ReadError::Unterminated { line }
            | ReadError::Io { line, .. } => *line,
        }
    }
}

/// Setup errors: raised before any document is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Start, end and comment tokens must share one length.
    #[error(
        "chunk tokens must have equal length (start {start:?}, end {end:?}, comment {comment:?})"
    )]
    TokenLength {
        start: String,
        end: String,
        comment: String,
    },

    /// Two of the three chunk tokens are identical.
    #[error("chunk tokens must be distinct, {token:?} is used twice")]
    TokenClash { token: String },

    /// An empty token would match every line.
    #[error("chunk tokens must not be empty")]
    EmptyToken,

    /// Session option bag carries a value of the wrong shape.
    #[error("invalid session option: {0}")]
    Options(#[source] serde_json::Error),

    /// The configured default plugin is not registered.
    #[error("default {kind} \"{name}\" is not registered")]
    UnknownDefault { kind: PluginKind, name: String },

    /// Endpoint string could not be parsed.
    #[error("invalid socket endpoint {input:?}: {reason}")]
    Endpoint { input: String, reason: String },

    /// Underlying I/O failure while reading the configuration file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Plugin registration failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} \"{name}\" is already registered")]
    Duplicate { kind: PluginKind, name: String },

    #[error("plugin \"{name}\" is declared as a {found} but was registered as a {expected}")]
    KindMismatch {
        name: String,
        expected: PluginKind,
        found: PluginKind,
    },
}

/// A failure reported by a plugin instance or its factory.
#[derive(Debug, Clone, Error)]
#[error("{plugin}: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}
