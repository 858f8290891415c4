#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # recmap-types
//!
//! Type handlers converting record field text to typed values and back.
//!
//! Every field in a record mapping names a type (`"string"`, `"int"`,
//! `"date"`, ...). The [`TypeHandlerRegistry`] resolves that name, plus an
//! optional [`HandlerConfig`], to a [`TypeHandler`] that parses field text
//! into a [`Value`] and formats values back to text.
//!
//! ## Example Usage
//!
//! ```rust
//! use recmap_types::{HandlerConfig, TypeHandlerRegistry, Value};
//!
//! let registry = TypeHandlerRegistry::with_defaults();
//! let handler = registry
//!     .resolve("date", &HandlerConfig::new().pattern("%d/%m/%Y"))
//!     .unwrap();
//!
//! let value = handler.parse("31/12/2024").unwrap();
//! assert!(matches!(value, Some(Value::Date(_))));
//! assert_eq!(handler.format(value.as_ref()).unwrap().as_deref(), Some("31/12/2024"));
//!
//! // empty text is an absent value, never an error
//! assert_eq!(handler.parse("").unwrap(), None);
//! ```

pub mod handler;
pub mod numeric;
pub mod registry;
pub mod temporal;
pub mod text;
pub mod value;

pub use handler::{HandlerConfig, TypeHandler};
pub use numeric::{DecimalHandler, IntegerHandler};
pub use registry::{HandlerFactory, TypeHandlerRegistry};
pub use temporal::{DateHandler, DateTimeHandler, TimeHandler};
pub use text::{BooleanHandler, CharHandler, StringHandler};
pub use value::{Value, ValueType};

use thiserror::Error;

/// Errors raised by type handlers and the handler registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Field text does not fully and validly parse to the declared type,
    /// or a value of the wrong type was handed to `format`
    #[error("Type conversion error: {message}")]
    Conversion { message: String },

    /// A handler was configured with a pattern it cannot use
    #[error("Invalid {type_name} format pattern '{pattern}': {reason}")]
    InvalidPattern {
        type_name: String,
        pattern: String,
        reason: String,
    },

    /// No handler is registered under the requested type name
    #[error("No type handler registered for type '{0}'")]
    UnknownType(String),
}

impl Error {
    /// Create a conversion error
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(
        type_name: impl Into<String>,
        pattern: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidPattern {
            type_name: type_name.into(),
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a configuration error rather than a per-field
    /// conversion failure
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Conversion { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::conversion("Invalid integer 'abc'");
        assert_eq!(err.to_string(), "Type conversion error: Invalid integer 'abc'");
        assert!(!err.is_configuration());

        let err = Error::invalid_pattern("date", "%Q", "unknown specifier");
        assert!(err.to_string().contains("'%Q'"));
        assert!(err.to_string().contains("date"));
        assert!(err.is_configuration());

        let err = Error::UnknownType("uuid".to_string());
        assert!(err.to_string().contains("'uuid'"));
        assert!(err.is_configuration());
    }
}
