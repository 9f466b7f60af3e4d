//! Session defaults decoded from the option bag.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use litweave_core::config::{DEFAULT_FORMATTER, DEFAULT_PROCESSOR};
use litweave_core::reader::{DEFAULT_COMMENT_TOKEN, DEFAULT_END_TOKEN, DEFAULT_START_TOKEN};
use litweave_core::{ConfigError, Options, Tokens};

use crate::plugins::{FORMATTER_KEY, PROCESSOR_KEY};

/// Recognised keys of a session option bag. Anything else in the bag is
/// left for plugin factories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub processor: String,
    pub formatter: String,
    pub start_token: String,
    pub end_token: String,
    pub comment_token: String,
    pub template_dir: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            processor: DEFAULT_PROCESSOR.to_string(),
            formatter: DEFAULT_FORMATTER.to_string(),
            start_token: DEFAULT_START_TOKEN.to_string(),
            end_token: DEFAULT_END_TOKEN.to_string(),
            comment_token: DEFAULT_COMMENT_TOKEN.to_string(),
            template_dir: None,
        }
    }
}

impl SessionSettings {
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        serde_json::from_value(Value::Object(options.clone())).map_err(ConfigError::Options)
    }

    pub fn tokens(&self) -> Result<Tokens, ConfigError> {
        Tokens::new(&self.start_token, &self.end_token, &self.comment_token)
    }

    /// Defaults every code chunk's directive is merged over, so chunk
    /// options name their processor and formatter before they are cached
    /// or dispatched.
    pub fn code_defaults(&self) -> Options {
        let mut defaults = Options::new();
        defaults.insert(PROCESSOR_KEY.to_string(), Value::from(self.processor.as_str()));
        defaults.insert(FORMATTER_KEY.to_string(), Value::from(self.formatter.as_str()));
        defaults
    }
}
