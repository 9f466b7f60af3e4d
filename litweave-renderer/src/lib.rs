//! # litweave-renderer
//!
//! Tera-based built-in formatters (`compact`, `none`) and the registry
//! carrying every built-in plugin.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! fn registry() -> Option<Arc<litweave_core::PluginRegistry>> {
//!     litweave_renderer::builtin_registry().ok().map(Arc::new)
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod formatters;

pub use context::{BlockContext, FigureContext};
pub use engine::{Template, TemplateEngine};
pub use error::RenderError;
pub use formatters::{CompactFormatter, CompactOptions, PlainFormatter};

use litweave_core::{processors, PluginRegistry, RegistryError};

/// A registry holding the core processors plus the built-in formatters.
pub fn builtin_registry() -> Result<PluginRegistry, RegistryError> {
    let mut registry = PluginRegistry::new();
    processors::register_builtin_processors(&mut registry)?;
    formatters::register_builtin_formatters(&mut registry)?;
    Ok(registry)
}
