//! Built-in formatters.
//!
//! * `compact`: one `.. code-block::` per chunk. The first kept text hunk
//!   opens the block and later ones continue it indented. Options:
//!   `e` echo source (default `true`), `a` show auto-printed results
//!   (default `false`), `s` silent, keeping tracebacks only (default
//!   `false`), `lang` directive language (default `python`).
//! * `none`: every hunk indented, no directives, no filtering.
//!
//! Both share one [`TemplateEngine`] per session, built from the session's
//! `template_dir` option.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use litweave_core::{
    Chunk, Formatter, Hunk, Options, PluginDescriptor, PluginError, PluginRegistry, RegistryError,
};

use crate::context::{BlockContext, FigureContext};
use crate::engine::TemplateEngine;
use crate::error::RenderError;

pub const COMPACT_FORMATTER: &str = "compact";
pub const PLAIN_FORMATTER: &str = "none";

fn default_lang() -> String {
    "python".to_string()
}

fn default_true() -> bool {
    true
}

/// Options the `compact` formatter reads from a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompactOptions {
    #[serde(default = "default_true")]
    pub e: bool,
    #[serde(default)]
    pub a: bool,
    #[serde(default)]
    pub s: bool,
    #[serde(default = "default_lang")]
    pub lang: String,
}

impl CompactOptions {
    pub fn from_options(options: &Options) -> Result<Self, RenderError> {
        serde_json::from_value(Value::Object(options.clone()))
            .map_err(|e| RenderError::Options(e.to_string()))
    }

    pub fn defaults() -> Options {
        let mut options = Options::new();
        options.insert("e".into(), Value::Bool(true));
        options.insert("a".into(), Value::Bool(false));
        options.insert("s".into(), Value::Bool(false));
        options.insert("lang".into(), Value::from(default_lang()));
        options
    }

    /// Whether a hunk survives this chunk's options.
    pub fn keeps(&self, hunk: &Hunk) -> bool {
        if self.s {
            return matches!(hunk, Hunk::Traceback { .. });
        }
        match hunk {
            Hunk::Source { .. } => self.e,
            Hunk::Result { .. } => self.a,
            _ => true,
        }
    }
}

fn render_hunk(
    engine: &TemplateEngine,
    chunk: &Chunk,
    lang: &str,
    hunk: &Hunk,
    lead: bool,
) -> Result<String, RenderError> {
    match hunk {
        Hunk::Figure(figure) => engine.render_figure(&FigureContext::from_figure(chunk.number, figure)),
        _ => match BlockContext::from_hunk(chunk.number, lang, hunk) {
            Some(ctx) => engine.render_block(&ctx, lead),
            None => Ok(String::new()),
        },
    }
}

// ---------------------------------------------------------------------------
// compact
// ---------------------------------------------------------------------------

pub struct CompactFormatter {
    engine: Arc<TemplateEngine>,
}

impl CompactFormatter {
    pub fn new(engine: Arc<TemplateEngine>) -> Self {
        Self { engine }
    }
}

impl Formatter for CompactFormatter {
    fn name(&self) -> &str {
        COMPACT_FORMATTER
    }

    fn format(
        &mut self,
        chunk: &Chunk,
        options: &Options,
        hunks: &[Hunk],
    ) -> Result<Vec<String>, PluginError> {
        let opts =
            CompactOptions::from_options(options).map_err(|e| e.into_plugin_error(COMPACT_FORMATTER))?;
        let mut fragments = Vec::new();
        for hunk in hunks.iter().filter(|h| opts.keeps(h)) {
            let fragment = render_hunk(&self.engine, chunk, &opts.lang, hunk, fragments.is_empty())
                .map_err(|e| e.into_plugin_error(COMPACT_FORMATTER))?;
            fragments.push(fragment);
        }
        Ok(fragments)
    }
}

// ---------------------------------------------------------------------------
// none
// ---------------------------------------------------------------------------

pub struct PlainFormatter {
    engine: Arc<TemplateEngine>,
}

impl PlainFormatter {
    pub fn new(engine: Arc<TemplateEngine>) -> Self {
        Self { engine }
    }
}

impl Formatter for PlainFormatter {
    fn name(&self) -> &str {
        PLAIN_FORMATTER
    }

    fn format(
        &mut self,
        chunk: &Chunk,
        _options: &Options,
        hunks: &[Hunk],
    ) -> Result<Vec<String>, PluginError> {
        hunks
            .iter()
            .map(|hunk| {
                render_hunk(&self.engine, chunk, "", hunk, false)
                    .map_err(|e| e.into_plugin_error(PLAIN_FORMATTER))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

fn engine_for(session: &Options, plugin: &str) -> Result<Arc<TemplateEngine>, PluginError> {
    let dir = session
        .get("template_dir")
        .and_then(Value::as_str)
        .map(PathBuf::from);
    TemplateEngine::new(dir.as_deref())
        .map(Arc::new)
        .map_err(|e| e.into_plugin_error(plugin))
}

/// Register `compact` and `none`.
pub fn register_builtin_formatters(registry: &mut PluginRegistry) -> Result<(), RegistryError> {
    registry.register_formatter(
        PluginDescriptor::formatter(COMPACT_FORMATTER, CompactOptions::defaults()),
        |session: &Options| -> Result<Box<dyn Formatter>, PluginError> {
            Ok(Box::new(CompactFormatter::new(engine_for(session, COMPACT_FORMATTER)?)))
        },
    )?;
    registry.register_formatter(
        PluginDescriptor::formatter(PLAIN_FORMATTER, Options::new()),
        |session: &Options| -> Result<Box<dyn Formatter>, PluginError> {
            Ok(Box::new(PlainFormatter::new(engine_for(session, PLAIN_FORMATTER)?)))
        },
    )
}
