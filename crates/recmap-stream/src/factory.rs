//! Shared registry of compiled streams

use crate::compiled::CompiledStream;
use crate::marshaller::Marshaller;
use crate::unmarshaller::Unmarshaller;
use crate::{Error, Result};
use dashmap::DashMap;
use recmap_schema::StreamDefinition;
use recmap_types::TypeHandlerRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// Compiles stream definitions once and hands out marshallers and
/// unmarshallers that share the compiled form.
///
/// The factory can be shared across threads behind an `Arc`; loading and
/// lookup do not block each other beyond the map's shard locks.
#[derive(Debug)]
pub struct StreamFactory {
    registry: Arc<TypeHandlerRegistry>,
    streams: DashMap<String, Arc<CompiledStream>>,
}

impl StreamFactory {
    /// Create a factory with the built-in type handlers
    pub fn new() -> Self {
        Self::with_registry(Arc::new(TypeHandlerRegistry::with_defaults()))
    }

    /// Create a factory with a pre-configured handler registry
    pub fn with_registry(registry: Arc<TypeHandlerRegistry>) -> Self {
        Self {
            registry,
            streams: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &TypeHandlerRegistry {
        &self.registry
    }

    /// Compile a definition and register it under its name, replacing any
    /// stream loaded earlier under the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Definition`] or [`Error::Handler`] when the
    /// definition does not compile. Nothing is registered in that case.
    pub fn load(&self, definition: &StreamDefinition) -> Result<Arc<CompiledStream>> {
        let stream = Arc::new(CompiledStream::compile(definition, &self.registry)?);
        if self
            .streams
            .insert(definition.name.clone(), Arc::clone(&stream))
            .is_some()
        {
            info!(stream = %definition.name, "Replaced loaded stream");
        } else {
            debug!(stream = %definition.name, "Loaded stream");
        }
        Ok(stream)
    }

    /// Get a compiled stream by name
    pub fn get(&self, name: &str) -> Option<Arc<CompiledStream>> {
        self.streams.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    /// Unregister a stream. Facades already created keep their copy.
    pub fn remove(&self, name: &str) -> Option<Arc<CompiledStream>> {
        self.streams.remove(name).map(|(_, stream)| stream)
    }

    /// Names of all loaded streams, sorted
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.streams.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Create a marshaller for a loaded stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamNotFound`] when no stream of that name is
    /// loaded.
    pub fn create_marshaller(&self, name: &str) -> Result<Marshaller> {
        Marshaller::new(self.require(name)?)
    }

    /// Create an unmarshaller for a loaded stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamNotFound`] when no stream of that name is
    /// loaded.
    pub fn create_unmarshaller(&self, name: &str) -> Result<Unmarshaller> {
        Unmarshaller::new(self.require(name)?)
    }

    fn require(&self, name: &str) -> Result<Arc<CompiledStream>> {
        self.get(name)
            .ok_or_else(|| Error::StreamNotFound(name.to_string()))
    }
}

impl Default for StreamFactory {
    fn default() -> Self {
        Self::new()
    }
}
