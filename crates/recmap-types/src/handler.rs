//! The type handler contract and its configuration

use crate::value::{Value, ValueType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Converts field text to a typed [`Value`] and back.
///
/// Implementations must be total over well-formed text for their type and
/// must reject text that only parses partially. Empty text always parses to
/// `None`, and formatting `None` yields `None`.
pub trait TypeHandler: Send + Sync + std::fmt::Debug {
    /// Parse field text into a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] when the text is not entirely a valid
    /// representation of the handler's type.
    fn parse(&self, text: &str) -> Result<Option<Value>>;

    /// Format a value into field text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] when the value has the wrong type or
    /// cannot be rendered.
    fn format(&self, value: Option<&Value>) -> Result<Option<String>>;

    /// The kind of value this handler produces
    fn value_type(&self) -> ValueType;
}

/// Per-field handler configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Custom format pattern overriding the handler default
    #[serde(default)]
    pub pattern: Option<String>,
    /// Tolerate surrounding whitespace when parsing (default: false)
    #[serde(default)]
    pub lenient: bool,
}

impl HandlerConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the format pattern
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set leniency
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Reject a pattern for handlers that have no use for one
    pub(crate) fn reject_pattern(&self, type_name: &str) -> Result<()> {
        match &self.pattern {
            Some(pattern) => Err(Error::invalid_pattern(
                type_name,
                pattern.as_str(),
                "type does not support format patterns",
            )),
            None => Ok(()),
        }
    }
}

/// Build the error for a value of the wrong kind handed to `format`
pub(crate) fn type_mismatch(expected: ValueType, found: &Value) -> Error {
    Error::conversion(format!(
        "Expected {expected} value, found {}",
        found.value_type()
    ))
}
