//! User configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.litweave/
//!   config.yaml     (optional; every field has a default)
//!   daemon.sock     (default daemon endpoint)
//! ```
//!
//! Loaders come in pairs: `load_at(home)` for an explicit home (tests use a
//! `TempDir`) and `load()` deriving home from `dirs::home_dir()`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoint::SocketEndpoint;
use crate::error::ConfigError;
use crate::reader::{Tokens, DEFAULT_COMMENT_TOKEN, DEFAULT_END_TOKEN, DEFAULT_START_TOKEN};
use crate::types::Options;

pub const DEFAULT_PROCESSOR: &str = "none";
pub const DEFAULT_FORMATTER: &str = "compact";

/// Contents of `<home>/.litweave/config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Daemon endpoint; `unix://<home>/.litweave/daemon.sock` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<SocketEndpoint>,
    pub processor: String,
    pub formatter: String,
    pub start_token: String,
    pub end_token: String,
    pub comment_token: String,
    /// Directory of `.tera` files overriding the built-in formatter templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
    /// Daemon log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Per-request time limit enforced by the daemon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            processor: DEFAULT_PROCESSOR.to_string(),
            formatter: DEFAULT_FORMATTER.to_string(),
            start_token: DEFAULT_START_TOKEN.to_string(),
            end_token: DEFAULT_END_TOKEN.to_string(),
            comment_token: DEFAULT_COMMENT_TOKEN.to_string(),
            template_dir: None,
            log_level: "info".to_string(),
            timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

/// `<home>/.litweave/`
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".litweave")
}

/// `<home>/.litweave/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("config.yaml")
}

/// `<home>/.litweave/daemon.sock`
pub fn default_socket_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("daemon.sock")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

impl Config {
    /// Load `<home>/.litweave/config.yaml`, falling back to defaults when the
    /// file is absent. Tokens are validated on load.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        let path = config_path_at(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Config = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?
        };
        config.tokens()?;
        Ok(config)
    }

    /// `load_at` convenience wrapper.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&home()?)
    }

    pub fn tokens(&self) -> Result<Tokens, ConfigError> {
        Tokens::new(&self.start_token, &self.end_token, &self.comment_token)
    }

    /// The configured endpoint, or the default socket under `home`.
    pub fn endpoint_at(&self, home: &Path) -> SocketEndpoint {
        self.endpoint
            .clone()
            .unwrap_or_else(|| SocketEndpoint::unix(default_socket_path_at(home)))
    }

    /// `endpoint_at` convenience wrapper.
    pub fn endpoint(&self) -> Result<SocketEndpoint, ConfigError> {
        Ok(self.endpoint_at(&home()?))
    }

    /// The session option bag every job built from this configuration carries.
    pub fn session_options(&self) -> Options {
        let mut options = Options::new();
        options.insert("processor".into(), Value::from(self.processor.as_str()));
        options.insert("formatter".into(), Value::from(self.formatter.as_str()));
        options.insert("start_token".into(), Value::from(self.start_token.as_str()));
        options.insert("end_token".into(), Value::from(self.end_token.as_str()));
        options.insert("comment_token".into(), Value::from(self.comment_token.as_str()));
        if let Some(dir) = &self.template_dir {
            options.insert(
                "template_dir".into(),
                Value::from(dir.to_string_lossy().into_owned()),
            );
        }
        options
    }
}
