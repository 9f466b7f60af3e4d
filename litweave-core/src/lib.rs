//! litweave core library: chunk model, reader, plugin registry, configuration.
//!
//! Public API surface:
//! - [`types`]: chunks, hunks, option bags, jobs and diagnostics
//! - [`reader`]: [`ChunkReader`], the line-driven chunk lexer
//! - [`registry`]: [`PluginRegistry`] plus the [`Processor`] / [`Formatter`] traits
//! - [`processors`]: built-in processors
//! - [`config`]: YAML configuration with `_at(home)` loaders
//! - [`endpoint`]: daemon socket endpoints
//! - [`error`]: [`ReadError`], [`ConfigError`], [`RegistryError`], [`PluginError`]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod processors;
pub mod reader;
pub mod registry;
pub mod types;

pub use config::Config;
pub use endpoint::SocketEndpoint;
pub use error::{ConfigError, PluginError, ReadError, RegistryError};
pub use reader::{ChunkReader, Tokens};
pub use registry::{Formatter, PluginDescriptor, PluginKind, PluginRegistry, Processor};
pub use types::{
    Chunk, ChunkKind, Diagnostic, Figure, Hunk, JobRequest, Operation, Options, ProjectKey,
    Severity,
};
