//! Name-keyed table of processor and formatter capabilities.
//!
//! A [`PluginRegistry`] is built once (see `litweave_renderer::builtin_registry`)
//! and shared behind an `Arc` by every session. It never holds plugin
//! instances itself: each session asks it to instantiate the plugins it
//! needs and keeps those instances for its own lifetime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, RegistryError};
use crate::types::{Chunk, Hunk, Options};

/// Which table a plugin lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Processor,
    Formatter,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Processor => write!(f, "processor"),
            PluginKind::Formatter => write!(f, "formatter"),
        }
    }
}

/// Static metadata declared by a plugin at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub kind: PluginKind,
    #[serde(default)]
    pub default_options: Options,
}

impl PluginDescriptor {
    pub fn processor(name: impl Into<String>, default_options: Options) -> Self {
        Self {
            name: name.into(),
            kind: PluginKind::Processor,
            default_options,
        }
    }

    pub fn formatter(name: impl Into<String>, default_options: Options) -> Self {
        Self {
            name: name.into(),
            kind: PluginKind::Formatter,
            default_options,
        }
    }

    /// Options handed to a plugin call: declared defaults overlaid by the
    /// chunk's own resolved options.
    pub fn resolve_options(&self, chunk_options: &Options) -> Options {
        crate::types::merge_options(&self.default_options, chunk_options)
    }
}

// ---------------------------------------------------------------------------
// Plugin traits
// ---------------------------------------------------------------------------

/// Turns a code chunk into hunks. Instances may keep state between calls;
/// one instance serves every chunk of a session, in document order.
pub trait Processor: Send {
    fn name(&self) -> &str;

    /// Runtime failures belong in the returned hunks (as a
    /// [`Hunk::Traceback`]), never in a panic.
    fn process(&mut self, chunk: &Chunk, options: &Options) -> Vec<Hunk>;
}

/// Renders one chunk's non-empty hunks into text fragments for the woven
/// output, in order.
pub trait Formatter: Send {
    fn name(&self) -> &str;

    fn format(
        &mut self,
        chunk: &Chunk,
        options: &Options,
        hunks: &[Hunk],
    ) -> Result<Vec<String>, PluginError>;
}

pub type ProcessorFactory =
    Arc<dyn Fn(&Options) -> Result<Box<dyn Processor>, PluginError> + Send + Sync>;
pub type FormatterFactory =
    Arc<dyn Fn(&Options) -> Result<Box<dyn Formatter>, PluginError> + Send + Sync>;

struct Entry<F> {
    descriptor: PluginDescriptor,
    factory: F,
}

// ---------------------------------------------------------------------------
// PluginRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct PluginRegistry {
    processors: HashMap<String, Entry<ProcessorFactory>>,
    formatters: HashMap<String, Entry<FormatterFactory>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut processors: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        let mut formatters: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        processors.sort_unstable();
        formatters.sort_unstable();
        f.debug_struct("PluginRegistry")
            .field("processors", &processors)
            .field("formatters", &formatters)
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor. The factory receives the session option bag
    /// each time a session instantiates the plugin.
    pub fn register_processor<F>(
        &mut self,
        descriptor: PluginDescriptor,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Options) -> Result<Box<dyn Processor>, PluginError> + Send + Sync + 'static,
    {
        check_kind(&descriptor, PluginKind::Processor)?;
        if self.processors.contains_key(&descriptor.name) {
            return Err(RegistryError::Duplicate {
                kind: PluginKind::Processor,
                name: descriptor.name,
            });
        }
        self.processors.insert(
            descriptor.name.clone(),
            Entry {
                descriptor,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    pub fn register_formatter<F>(
        &mut self,
        descriptor: PluginDescriptor,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Options) -> Result<Box<dyn Formatter>, PluginError> + Send + Sync + 'static,
    {
        check_kind(&descriptor, PluginKind::Formatter)?;
        if self.formatters.contains_key(&descriptor.name) {
            return Err(RegistryError::Duplicate {
                kind: PluginKind::Formatter,
                name: descriptor.name,
            });
        }
        self.formatters.insert(
            descriptor.name.clone(),
            Entry {
                descriptor,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    pub fn descriptor(&self, kind: PluginKind, name: &str) -> Option<&PluginDescriptor> {
        match kind {
            PluginKind::Processor => self.processors.get(name).map(|e| &e.descriptor),
            PluginKind::Formatter => self.formatters.get(name).map(|e| &e.descriptor),
        }
    }

    pub fn contains(&self, kind: PluginKind, name: &str) -> bool {
        self.descriptor(kind, name).is_some()
    }

    pub fn instantiate_processor(
        &self,
        name: &str,
        session_options: &Options,
    ) -> Result<Box<dyn Processor>, PluginError> {
        let entry = self
            .processors
            .get(name)
            .ok_or_else(|| PluginError::new(name, "processor is not registered"))?;
        (entry.factory)(session_options)
    }

    pub fn instantiate_formatter(
        &self,
        name: &str,
        session_options: &Options,
    ) -> Result<Box<dyn Formatter>, PluginError> {
        let entry = self
            .formatters
            .get(name)
            .ok_or_else(|| PluginError::new(name, "formatter is not registered"))?;
        (entry.factory)(session_options)
    }

    /// All descriptors, processors first, each group sorted by name.
    pub fn descriptors(&self) -> Vec<&PluginDescriptor> {
        let mut processors: Vec<_> = self.processors.values().map(|e| &e.descriptor).collect();
        let mut formatters: Vec<_> = self.formatters.values().map(|e| &e.descriptor).collect();
        processors.sort_by(|a, b| a.name.cmp(&b.name));
        formatters.sort_by(|a, b| a.name.cmp(&b.name));
        processors.extend(formatters);
        processors
    }
}

fn check_kind(descriptor: &PluginDescriptor, expected: PluginKind) -> Result<(), RegistryError> {
    if descriptor.kind != expected {
        return Err(RegistryError::KindMismatch {
            name: descriptor.name.clone(),
            expected,
            found: descriptor.kind,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    impl Processor for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn process(&mut self, chunk: &Chunk, _options: &Options) -> Vec<Hunk> {
            vec![Hunk::stdout(chunk.raw.to_uppercase())]
        }
    }

    fn upper_factory(_: &Options) -> Result<Box<dyn Processor>, PluginError> {
        Ok(Box::new(Upper))
    }

    #[test]
    fn duplicate_name_for_same_kind_is_rejected() {
        let mut registry = PluginRegistry::new();
        registry
            .register_processor(PluginDescriptor::processor("upper", Options::new()), upper_factory)
            .unwrap();
        let err = registry
            .register_processor(PluginDescriptor::processor("upper", Options::new()), upper_factory)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { kind: PluginKind::Processor, .. }));
        assert_eq!(err.to_string(), "processor \"upper\" is already registered");
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut registry = PluginRegistry::new();
        let err = registry
            .register_processor(PluginDescriptor::formatter("upper", Options::new()), upper_factory)
            .unwrap_err();
        assert!(matches!(err, RegistryError::KindMismatch { .. }));
        assert!(!registry.contains(PluginKind::Processor, "upper"));
    }

    #[test]
    fn instantiate_runs_factory_per_call() {
        let mut registry = PluginRegistry::new();
        registry
            .register_processor(PluginDescriptor::processor("upper", Options::new()), upper_factory)
            .unwrap();
        let mut first = registry.instantiate_processor("upper", &Options::new()).unwrap();
        let chunk = Chunk::code(0, 1, Options::new(), "abc\n");
        assert_eq!(first.process(&chunk, &Options::new()), vec![Hunk::stdout("ABC\n")]);
        assert!(registry.instantiate_processor("missing", &Options::new()).is_err());
    }

    #[test]
    fn resolve_options_overlays_chunk_over_defaults() {
        let descriptor = PluginDescriptor::formatter(
            "compact",
            json!({"e": true, "a": false}).as_object().cloned().unwrap(),
        );
        let chunk = json!({"a": true}).as_object().cloned().unwrap();
        let resolved = descriptor.resolve_options(&chunk);
        assert_eq!(resolved.get("e"), Some(&json!(true)));
        assert_eq!(resolved.get("a"), Some(&json!(true)));
    }
}
