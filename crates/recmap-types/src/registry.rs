//! Registry of type handlers keyed by type name

use crate::handler::{HandlerConfig, TypeHandler};
use crate::numeric::{DecimalHandler, IntegerHandler};
use crate::temporal::{DateHandler, DateTimeHandler, TimeHandler};
use crate::text::{BooleanHandler, CharHandler, StringHandler};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Builds a handler instance for one field configuration
pub type HandlerFactory =
    Arc<dyn Fn(&HandlerConfig) -> Result<Arc<dyn TypeHandler>> + Send + Sync>;

/// Registry mapping type names to handler factories.
///
/// Type names are case-insensitive. A registry is only mutated while it is
/// being set up; once shared it is read-only and may be used from any thread.
#[derive(Clone, Default)]
pub struct TypeHandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl std::fmt::Debug for TypeHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeHandlerRegistry")
            .field("types", &names)
            .finish()
    }
}

fn factory<H, F>(build: F) -> HandlerFactory
where
    H: TypeHandler + 'static,
    F: Fn(&HandlerConfig) -> Result<H> + Send + Sync + 'static,
{
    Arc::new(move |config: &HandlerConfig| {
        Ok(Arc::new(build(config)?) as Arc<dyn TypeHandler>)
    })
}

impl TypeHandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in handlers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("string", factory(StringHandler::configured));
        registry.register("char", factory(CharHandler::configured));
        registry.register("boolean", factory(BooleanHandler::configured));
        for alias in ["int", "integer", "long"] {
            registry.register(alias, factory(IntegerHandler::configured));
        }
        for alias in ["decimal", "double", "float"] {
            registry.register(alias, factory(DecimalHandler::configured));
        }
        registry.register("date", factory(DateHandler::configured));
        registry.register("time", factory(TimeHandler::configured));
        registry.register("datetime", factory(DateTimeHandler::configured));
        debug!(types = registry.factories.len(), "Registered default type handlers");
        registry
    }

    /// Register (or replace) the factory for a type name
    pub fn register(&mut self, type_name: &str, factory: HandlerFactory) {
        self.factories.insert(type_name.to_ascii_lowercase(), factory);
    }

    /// Register a handler that ignores field configuration
    pub fn register_handler(&mut self, type_name: &str, handler: Arc<dyn TypeHandler>) {
        self.register(
            type_name,
            Arc::new(move |_: &HandlerConfig| Ok(Arc::clone(&handler))),
        );
    }

    /// Check if a type name is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(&type_name.to_ascii_lowercase())
    }

    /// Resolve a configured handler for a type name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`] for unregistered names and
    /// [`Error::InvalidPattern`] when the configuration is rejected.
    pub fn resolve(&self, type_name: &str, config: &HandlerConfig) -> Result<Arc<dyn TypeHandler>> {
        let factory = self
            .factories
            .get(&type_name.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        trace!(type_name, ?config, "Resolving type handler");
        factory(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, ValueType};

    #[test]
    fn test_default_types() {
        let registry = TypeHandlerRegistry::with_defaults();
        for name in [
            "string", "char", "boolean", "int", "integer", "long", "decimal", "double", "float",
            "date", "time", "datetime",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(registry.contains("Integer"));
        assert!(!registry.contains("uuid"));
    }

    #[test]
    fn test_resolve() {
        let registry = TypeHandlerRegistry::with_defaults();
        let handler = registry.resolve("long", &HandlerConfig::default()).unwrap();
        assert_eq!(handler.value_type(), ValueType::Integer);
        assert_eq!(handler.parse("10").unwrap(), Some(Value::Integer(10)));
    }

    #[test]
    fn test_resolve_unknown_type() {
        let registry = TypeHandlerRegistry::with_defaults();
        let err = registry.resolve("uuid", &HandlerConfig::default()).unwrap_err();
        assert_eq!(err, Error::UnknownType("uuid".to_string()));
    }

    #[test]
    fn test_resolve_invalid_pattern() {
        let registry = TypeHandlerRegistry::with_defaults();
        let err = registry
            .resolve("date", &HandlerConfig::new().pattern("%Y-%Q"))
            .unwrap_err();
        assert!(err.is_configuration());

        let err = registry
            .resolve("int", &HandlerConfig::new().pattern("#,##0"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_register_custom_handler() {
        let mut registry = TypeHandlerRegistry::new();
        registry.register_handler("code", Arc::new(StringHandler::new()));
        let handler = registry.resolve("CODE", &HandlerConfig::default()).unwrap();
        assert_eq!(handler.value_type(), ValueType::String);
        assert!(format!("{registry:?}").contains("code"));
    }
}
