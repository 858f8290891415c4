//! Handlers for textual scalar types: string, char and boolean

use crate::handler::{HandlerConfig, TypeHandler, type_mismatch};
use crate::value::{Value, ValueType};
use crate::{Error, Result};

/// Pass-through handler for `String` fields
#[derive(Debug, Clone, Default)]
pub struct StringHandler;

impl StringHandler {
    /// Create a string handler
    pub fn new() -> Self {
        Self
    }

    /// Create a handler from field configuration
    pub fn configured(config: &HandlerConfig) -> Result<Self> {
        config.reject_pattern("string")?;
        Ok(Self)
    }
}

impl TypeHandler for StringHandler {
    fn parse(&self, text: &str) -> Result<Option<Value>> {
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(Value::String(text.to_string())))
    }

    fn format(&self, value: Option<&Value>) -> Result<Option<String>> {
        match value {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Char(c)) => Ok(Some(c.to_string())),
            Some(other) => Err(type_mismatch(ValueType::String, other)),
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::String
    }
}

/// Handler for single-character fields
#[derive(Debug, Clone, Default)]
pub struct CharHandler;

impl CharHandler {
    /// Create a handler from field configuration
    pub fn configured(config: &HandlerConfig) -> Result<Self> {
        config.reject_pattern("char")?;
        Ok(Self)
    }
}

impl TypeHandler for CharHandler {
    fn parse(&self, text: &str) -> Result<Option<Value>> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(None),
            (Some(c), None) => Ok(Some(Value::Char(c))),
            (Some(_), Some(_)) => Err(Error::conversion(format!(
                "Invalid character '{text}': expected exactly one character"
            ))),
        }
    }

    fn format(&self, value: Option<&Value>) -> Result<Option<String>> {
        match value {
            None => Ok(None),
            Some(Value::Char(c)) => Ok(Some(c.to_string())),
            Some(other) => Err(type_mismatch(ValueType::Char, other)),
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::Char
    }
}

/// Handler for `true`/`false` fields
#[derive(Debug, Clone, Default)]
pub struct BooleanHandler {
    lenient: bool,
}

impl BooleanHandler {
    /// Create a handler from field configuration
    pub fn configured(config: &HandlerConfig) -> Result<Self> {
        config.reject_pattern("boolean")?;
        Ok(Self {
            lenient: config.lenient,
        })
    }
}

impl TypeHandler for BooleanHandler {
    fn parse(&self, text: &str) -> Result<Option<Value>> {
        if text.is_empty() {
            return Ok(None);
        }
        let candidate = if self.lenient { text.trim() } else { text };
        match candidate {
            "true" => Ok(Some(Value::Boolean(true))),
            "false" => Ok(Some(Value::Boolean(false))),
            _ => Err(Error::conversion(format!("Invalid boolean '{text}'"))),
        }
    }

    fn format(&self, value: Option<&Value>) -> Result<Option<String>> {
        match value {
            None => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(type_mismatch(ValueType::Boolean, other)),
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::Boolean
    }
}
