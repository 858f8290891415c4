//! Integer and decimal handlers

use crate::handler::{HandlerConfig, TypeHandler, type_mismatch};
use crate::value::{Value, ValueType};
use crate::{Error, Result};

fn candidate(text: &str, lenient: bool) -> &str {
    if lenient { text.trim() } else { text }
}

/// Handler for 64-bit signed integer fields
#[derive(Debug, Clone, Default)]
pub struct IntegerHandler {
    lenient: bool,
}

impl IntegerHandler {
    /// Create a handler from field configuration
    pub fn configured(config: &HandlerConfig) -> Result<Self> {
        config.reject_pattern("integer")?;
        Ok(Self {
            lenient: config.lenient,
        })
    }
}

impl TypeHandler for IntegerHandler {
    fn parse(&self, text: &str) -> Result<Option<Value>> {
        if text.is_empty() {
            return Ok(None);
        }
        candidate(text, self.lenient)
            .parse::<i64>()
            .map(|i| Some(Value::Integer(i)))
            .map_err(|e| Error::conversion(format!("Invalid integer '{text}': {e}")))
    }

    fn format(&self, value: Option<&Value>) -> Result<Option<String>> {
        match value {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(i.to_string())),
            Some(other) => Err(type_mismatch(ValueType::Integer, other)),
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::Integer
    }
}

/// Handler for floating point decimal fields.
///
/// Only finite values are accepted in either direction.
#[derive(Debug, Clone, Default)]
pub struct DecimalHandler {
    lenient: bool,
}

impl DecimalHandler {
    /// Create a handler from field configuration
    pub fn configured(config: &HandlerConfig) -> Result<Self> {
        config.reject_pattern("decimal")?;
        Ok(Self {
            lenient: config.lenient,
        })
    }
}

impl TypeHandler for DecimalHandler {
    fn parse(&self, text: &str) -> Result<Option<Value>> {
        if text.is_empty() {
            return Ok(None);
        }
        let number = candidate(text, self.lenient)
            .parse::<f64>()
            .map_err(|e| Error::conversion(format!("Invalid decimal '{text}': {e}")))?;
        if !number.is_finite() {
            return Err(Error::conversion(format!(
                "Invalid decimal '{text}': value is not finite"
            )));
        }
        Ok(Some(Value::Decimal(number)))
    }

    fn format(&self, value: Option<&Value>) -> Result<Option<String>> {
        match value {
            None => Ok(None),
            Some(Value::Decimal(d)) if d.is_finite() => Ok(Some(d.to_string())),
            Some(Value::Decimal(d)) => Err(Error::conversion(format!(
                "Cannot format non-finite decimal {d}"
            ))),
            Some(Value::Integer(i)) => Ok(Some(i.to_string())),
            Some(other) => Err(type_mismatch(ValueType::Decimal, other)),
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::Decimal
    }
}
