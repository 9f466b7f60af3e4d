//! Error types for litweave-renderer.

use std::path::PathBuf;

use thiserror::Error;

use litweave_core::PluginError;

/// All errors that can arise from template rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (building tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    /// Formatter options carry a value of the wrong shape.
    #[error("invalid formatter options: {0}")]
    Options(String),
}

impl RenderError {
    /// Attribute this error to the formatter that raised it.
    pub fn into_plugin_error(self, plugin: &str) -> PluginError {
        PluginError::new(plugin, self.to_string())
    }
}
