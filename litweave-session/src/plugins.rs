//! Live plugin instances and per-chunk dispatch.
//!
//! A session instantiates each plugin the first time a chunk names it and
//! keeps that instance until the session is dropped, so a processor sees
//! every chunk of the document in order.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use litweave_core::{
    Chunk, Diagnostic, Formatter, Hunk, Options, PluginError, PluginKind, PluginRegistry,
    Processor,
};

use crate::settings::SessionSettings;

/// Chunk option naming the processor.
pub const PROCESSOR_KEY: &str = "proc";
/// Chunk option naming the formatter.
pub const FORMATTER_KEY: &str = "form";

/// What one code chunk contributed to the weave.
#[derive(Debug, Default)]
pub struct Dispatched {
    pub fragments: Vec<String>,
    /// Non-empty hunks the processor produced.
    pub hunks: usize,
}

#[derive(Default)]
pub struct LivePlugins {
    processors: HashMap<String, Box<dyn Processor>>,
    formatters: HashMap<String, Box<dyn Formatter>>,
}

impl LivePlugins {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session's instance of `name`, created on first use.
    pub fn processor(
        &mut self,
        registry: &PluginRegistry,
        name: &str,
        session_options: &Options,
    ) -> Result<&mut dyn Processor, PluginError> {
        match self.processors.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_mut()),
            Entry::Vacant(entry) => {
                let instance = registry.instantiate_processor(name, session_options)?;
                tracing::debug!("instantiated processor {}", name);
                Ok(entry.insert(instance).as_mut())
            }
        }
    }

    pub fn formatter(
        &mut self,
        registry: &PluginRegistry,
        name: &str,
        session_options: &Options,
    ) -> Result<&mut dyn Formatter, PluginError> {
        match self.formatters.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_mut()),
            Entry::Vacant(entry) => {
                let instance = registry.instantiate_formatter(name, session_options)?;
                tracing::debug!("instantiated formatter {}", name);
                Ok(entry.insert(instance).as_mut())
            }
        }
    }

    /// Names of the live instances, processors then formatters.
    pub fn live_names(&self) -> (Vec<&str>, Vec<&str>) {
        let mut processors: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        let mut formatters: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        processors.sort_unstable();
        formatters.sort_unstable();
        (processors, formatters)
    }

    /// Run one code chunk through its processor and formatter.
    ///
    /// Unknown plugin names and plugin failures never abort the run: each
    /// pushes one diagnostic and the chunk contributes nothing.
    pub fn dispatch(
        &mut self,
        registry: &PluginRegistry,
        settings: &SessionSettings,
        session_options: &Options,
        chunk: &Chunk,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Dispatched {
        let proc_name = chunk
            .option_str(PROCESSOR_KEY)
            .unwrap_or(&settings.processor)
            .to_string();
        let Some(descriptor) = registry.descriptor(PluginKind::Processor, &proc_name) else {
            tracing::warn!(
                "chunk #{} (line {}): unknown processor {:?}",
                chunk.number,
                chunk.line_number,
                proc_name
            );
            diagnostics.push(
                Diagnostic::warning(
                    chunk.line_number,
                    format!("unknown processor {proc_name:?}, chunk skipped"),
                )
                .for_chunk(chunk.number),
            );
            return Dispatched::default();
        };
        let proc_options = descriptor.resolve_options(&chunk.options);

        let hunks: Vec<Hunk> = match self.processor(registry, &proc_name, session_options) {
            Ok(processor) => processor
                .process(chunk, &proc_options)
                .into_iter()
                .filter(|h| !h.is_empty())
                .collect(),
            Err(err) => {
                tracing::error!("chunk #{}: {}", chunk.number, err);
                diagnostics
                    .push(Diagnostic::error(chunk.line_number, err.to_string()).for_chunk(chunk.number));
                return Dispatched::default();
            }
        };
        if hunks.is_empty() {
            return Dispatched::default();
        }

        let form_name = chunk
            .option_str(FORMATTER_KEY)
            .unwrap_or(&settings.formatter)
            .to_string();
        let Some(descriptor) = registry.descriptor(PluginKind::Formatter, &form_name) else {
            tracing::warn!(
                "chunk #{} (line {}): unknown formatter {:?}",
                chunk.number,
                chunk.line_number,
                form_name
            );
            diagnostics.push(
                Diagnostic::warning(
                    chunk.line_number,
                    format!("unknown formatter {form_name:?}, chunk skipped"),
                )
                .for_chunk(chunk.number),
            );
            return Dispatched {
                fragments: Vec::new(),
                hunks: hunks.len(),
            };
        };
        let form_options = descriptor.resolve_options(&chunk.options);

        let formatted = self
            .formatter(registry, &form_name, session_options)
            .and_then(|formatter| formatter.format(chunk, &form_options, &hunks));
        match formatted {
            Ok(fragments) => Dispatched {
                fragments,
                hunks: hunks.len(),
            },
            Err(err) => {
                tracing::error!("chunk #{}: {}", chunk.number, err);
                diagnostics
                    .push(Diagnostic::error(chunk.line_number, err.to_string()).for_chunk(chunk.number));
                Dispatched {
                    fragments: Vec::new(),
                    hunks: hunks.len(),
                }
            }
        }
    }
}
