//! Built-in processors.
//!
//! Only `none` ships with the core: it executes nothing and hands the chunk
//! body back as a single [`Hunk::Source`]. Language-executing processors are
//! registered by embedders.

use crate::error::{PluginError, RegistryError};
use crate::registry::{PluginDescriptor, PluginRegistry, Processor};
use crate::types::{Chunk, Hunk, Options};

pub const ECHO_PROCESSOR: &str = "none";

/// Echoes every chunk back unchanged.
#[derive(Debug, Default)]
pub struct EchoProcessor;

impl Processor for EchoProcessor {
    fn name(&self) -> &str {
        ECHO_PROCESSOR
    }

    fn process(&mut self, chunk: &Chunk, _options: &Options) -> Vec<Hunk> {
        vec![Hunk::source(chunk.raw.clone())]
    }
}

/// Register every processor the core provides.
pub fn register_builtin_processors(registry: &mut PluginRegistry) -> Result<(), RegistryError> {
    registry.register_processor(
        PluginDescriptor::processor(ECHO_PROCESSOR, Options::new()),
        |_session: &Options| -> Result<Box<dyn Processor>, PluginError> {
            Ok(Box::new(EchoProcessor))
        },
    )
}
