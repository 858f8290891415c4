//! Date, time and date-time handlers backed by chrono strftime patterns.
//!
//! A configured pattern is validated when the handler is built: unknown
//! specifiers, specifiers that do not apply to the value type, and patterns
//! that cannot be parsed back into a complete value all fail with
//! [`Error::InvalidPattern`].
//!
//! Parsing is strict about consumption. chrono reports any unparsed
//! remainder and the handler rejects it, so `2024-01-15x` is not a date even
//! though `2024-01-15` is a valid prefix. A strict handler also rejects
//! whitespace the pattern does not render, such as `2024-01- 5`. With
//! `lenient` set, surrounding whitespace is tolerated; trailing text is still
//! rejected.

use crate::handler::{HandlerConfig, TypeHandler, type_mismatch};
use crate::value::{Value, ValueType};
use crate::{Error, Result};
use chrono::format::{Item, ParseResult, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt::Write;
use std::marker::PhantomData;
use tracing::trace;

/// A chrono value type usable by [`TemporalHandler`]
pub trait Temporal: Sized + Default + std::fmt::Debug + Send + Sync + 'static {
    /// Type name used in messages
    const TYPE_NAME: &'static str;
    /// Pattern used when none is configured
    const DEFAULT_PATTERN: &'static str;
    /// Value kind produced
    const VALUE_TYPE: ValueType;

    /// Parse a prefix of `text`, returning the value and the unparsed rest
    fn parse_prefix<'a>(text: &'a str, pattern: &str) -> ParseResult<(Self, &'a str)>;

    /// Render into `out`, failing if the pattern does not apply
    fn render(&self, pattern: &str, out: &mut String) -> std::fmt::Result;

    /// Wrap into a [`Value`]
    fn into_value(self) -> Value;

    /// Unwrap from a [`Value`] of the matching kind
    fn from_value(value: &Value) -> Option<Self>;
}

impl Temporal for NaiveDate {
    const TYPE_NAME: &'static str = "date";
    const DEFAULT_PATTERN: &'static str = "%Y-%m-%d";
    const VALUE_TYPE: ValueType = ValueType::Date;

    fn parse_prefix<'a>(text: &'a str, pattern: &str) -> ParseResult<(Self, &'a str)> {
        NaiveDate::parse_and_remainder(text, pattern)
    }

    fn render(&self, pattern: &str, out: &mut String) -> std::fmt::Result {
        write!(out, "{}", self.format(pattern))
    }

    fn into_value(self) -> Value {
        Value::Date(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl Temporal for NaiveTime {
    const TYPE_NAME: &'static str = "time";
    const DEFAULT_PATTERN: &'static str = "%H:%M:%S";
    const VALUE_TYPE: ValueType = ValueType::Time;

    fn parse_prefix<'a>(text: &'a str, pattern: &str) -> ParseResult<(Self, &'a str)> {
        NaiveTime::parse_and_remainder(text, pattern)
    }

    fn render(&self, pattern: &str, out: &mut String) -> std::fmt::Result {
        write!(out, "{}", self.format(pattern))
    }

    fn into_value(self) -> Value {
        Value::Time(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl Temporal for NaiveDateTime {
    const TYPE_NAME: &'static str = "datetime";
    const DEFAULT_PATTERN: &'static str = "%Y-%m-%dT%H:%M:%S";
    const VALUE_TYPE: ValueType = ValueType::DateTime;

    fn parse_prefix<'a>(text: &'a str, pattern: &str) -> ParseResult<(Self, &'a str)> {
        NaiveDateTime::parse_and_remainder(text, pattern)
    }

    fn render(&self, pattern: &str, out: &mut String) -> std::fmt::Result {
        write!(out, "{}", self.format(pattern))
    }

    fn into_value(self) -> Value {
        Value::DateTime(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

/// Pattern-driven handler for a chrono value type
#[derive(Debug, Clone)]
pub struct TemporalHandler<T> {
    pattern: String,
    lenient: bool,
    _marker: PhantomData<fn() -> T>,
}

/// Handler for `date` fields
pub type DateHandler = TemporalHandler<NaiveDate>;
/// Handler for `time` fields
pub type TimeHandler = TemporalHandler<NaiveTime>;
/// Handler for `datetime` fields
pub type DateTimeHandler = TemporalHandler<NaiveDateTime>;

impl<T: Temporal> Default for TemporalHandler<T> {
    fn default() -> Self {
        Self {
            pattern: T::DEFAULT_PATTERN.to_string(),
            lenient: false,
            _marker: PhantomData,
        }
    }
}

impl<T: Temporal> TemporalHandler<T> {
    /// Create a handler from field configuration, validating the pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] naming the pattern if it is not
    /// usable for this value type.
    pub fn configured(config: &HandlerConfig) -> Result<Self> {
        let pattern = match &config.pattern {
            Some(pattern) => {
                validate_pattern::<T>(pattern)?;
                pattern.clone()
            }
            None => T::DEFAULT_PATTERN.to_string(),
        };
        Ok(Self {
            pattern,
            lenient: config.lenient,
            _marker: PhantomData,
        })
    }

    /// The effective pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether surrounding whitespace is tolerated
    pub fn is_lenient(&self) -> bool {
        self.lenient
    }
}

impl<T: Temporal> TemporalHandler<T> {
    /// chrono skips whitespace ahead of numeric fields. A strict handler
    /// only accepts whitespace where the pattern renders it.
    fn reject_stray_whitespace(&self, text: &str, value: &T) -> Result<()> {
        if !text.contains(char::is_whitespace) {
            return Ok(());
        }
        let mut rendered = String::new();
        value
            .render(&self.pattern, &mut rendered)
            .map_err(|_| Error::conversion(format!("Invalid {} '{text}'", T::TYPE_NAME)))?;
        if whitespace_shape(text) != whitespace_shape(&rendered) {
            trace!(text, rendered, pattern = %self.pattern, "Rejecting unexpected whitespace");
            return Err(Error::conversion(format!(
                "Invalid {} '{text}': whitespace does not match pattern '{}'",
                T::TYPE_NAME,
                self.pattern
            )));
        }
        Ok(())
    }
}

/// Leading whitespace, token count and trailing whitespace
fn whitespace_shape(text: &str) -> (bool, usize, bool) {
    (
        text.starts_with(char::is_whitespace),
        text.split_whitespace().count(),
        text.ends_with(char::is_whitespace),
    )
}

fn validate_pattern<T: Temporal>(pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(Error::invalid_pattern(
            T::TYPE_NAME,
            pattern,
            "unrecognized format specifier",
        ));
    }

    let mut sample = String::new();
    T::default().render(pattern, &mut sample).map_err(|_| {
        Error::invalid_pattern(
            T::TYPE_NAME,
            pattern,
            format!("pattern does not apply to {} values", T::TYPE_NAME),
        )
    })?;

    match T::parse_prefix(&sample, pattern) {
        Ok((_, rest)) if rest.is_empty() => Ok(()),
        Ok(_) => Err(Error::invalid_pattern(
            T::TYPE_NAME,
            pattern,
            "formatted text cannot be parsed back",
        )),
        Err(e) => Err(Error::invalid_pattern(
            T::TYPE_NAME,
            pattern,
            format!("pattern cannot describe a complete {}: {e}", T::TYPE_NAME),
        )),
    }
}

impl<T: Temporal> TypeHandler for TemporalHandler<T> {
    fn parse(&self, text: &str) -> Result<Option<Value>> {
        let candidate = if self.lenient { text.trim() } else { text };
        if candidate.is_empty() {
            return Ok(None);
        }

        let (value, rest) = T::parse_prefix(candidate, &self.pattern).map_err(|e| {
            Error::conversion(format!("Invalid {} '{text}': {e}", T::TYPE_NAME))
        })?;
        if !rest.is_empty() {
            trace!(text, rest, pattern = %self.pattern, "Rejecting partial temporal match");
            return Err(Error::conversion(format!(
                "Invalid {} '{text}': unparsed trailing text '{rest}'",
                T::TYPE_NAME
            )));
        }
        if !self.lenient {
            self.reject_stray_whitespace(text, &value)?;
        }
        Ok(Some(value.into_value()))
    }

    fn format(&self, value: Option<&Value>) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let temporal = T::from_value(value).ok_or_else(|| type_mismatch(T::VALUE_TYPE, value))?;
        let mut out = String::new();
        temporal.render(&self.pattern, &mut out).map_err(|_| {
            Error::conversion(format!(
                "Cannot format {} with pattern '{}'",
                T::TYPE_NAME,
                self.pattern
            ))
        })?;
        Ok(Some(out))
    }

    fn value_type(&self) -> ValueType {
        T::VALUE_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_date_pattern() {
        let handler = DateHandler::default();
        assert_eq!(handler.pattern(), "%Y-%m-%d");
        assert_eq!(
            handler.parse("2024-01-15").unwrap(),
            Some(Value::Date(date(2024, 1, 15)))
        );
    }

    #[test]
    fn test_empty_text_is_absent() {
        assert_eq!(DateHandler::default().parse("").unwrap(), None);
        assert_eq!(TimeHandler::default().parse("").unwrap(), None);
        assert_eq!(DateTimeHandler::default().parse("").unwrap(), None);
    }

    #[test]
    fn test_trailing_text_rejected() {
        let handler = DateHandler::default();
        let err = handler.parse("2024-01-15x").unwrap_err();
        assert!(err.to_string().contains("trailing"));
        assert!(handler.parse("2024-01-15 ").is_err());
    }

    #[test]
    fn test_strict_rejects_whitespace_outside_pattern() {
        let handler = DateHandler::default();
        assert!(!handler.is_lenient());
        assert!(handler.parse(" 2024-01-15").is_err());
        assert!(handler.parse("2024-01- 5").is_err());
        assert!(handler.parse("2024- 01-15").is_err());

        let spaced = DateHandler::configured(&HandlerConfig::new().pattern("%d %m %Y")).unwrap();
        assert_eq!(
            spaced.parse("15 01 2024").unwrap(),
            Some(Value::Date(date(2024, 1, 15)))
        );
        assert!(spaced.parse("15 01  2024").is_ok());
        assert!(spaced.parse(" 15 01 2024").is_err());

        let time = TimeHandler::default();
        assert!(time.parse("14: 30:00").is_err());
    }

    #[test]
    fn test_lenient_tolerates_whitespace_only() {
        let config = HandlerConfig::new().lenient(true);
        let handler = DateHandler::configured(&config).unwrap();
        assert!(handler.is_lenient());
        assert_eq!(
            handler.parse(" 2024-01-15 ").unwrap(),
            Some(Value::Date(date(2024, 1, 15)))
        );
        assert!(handler.parse("2024-01-15 junk").is_err());
        assert_eq!(handler.parse("   ").unwrap(), None);
    }

    #[test]
    fn test_invalid_calendar_date() {
        let handler = DateHandler::default();
        assert!(handler.parse("2024-02-30").is_err());
        assert!(handler.parse("2024-13-01").is_err());
    }

    #[test]
    fn test_custom_pattern() {
        let handler = DateHandler::configured(&HandlerConfig::new().pattern("%Y%m%d")).unwrap();
        let value = handler.parse("20240115").unwrap();
        assert_eq!(value, Some(Value::Date(date(2024, 1, 15))));
        assert_eq!(
            handler.format(value.as_ref()).unwrap().as_deref(),
            Some("20240115")
        );
    }

    #[test]
    fn test_invalid_pattern_fails_fast() {
        let err = DateHandler::configured(&HandlerConfig::new().pattern("%Y-%Q")).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref pattern, .. } if pattern == "%Y-%Q"));
    }

    #[test]
    fn test_pattern_not_applicable_to_type() {
        // a date cannot render hours
        let err = DateHandler::configured(&HandlerConfig::new().pattern("%H:%M")).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));

        // year and month alone cannot produce a complete date
        let err = DateHandler::configured(&HandlerConfig::new().pattern("%Y-%m")).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_time_and_datetime() {
        let time = TimeHandler::configured(&HandlerConfig::new().pattern("%H%M%S")).unwrap();
        let value = time.parse("143000").unwrap().unwrap();
        assert_eq!(value, Value::Time(NaiveTime::from_hms_opt(14, 30, 0).unwrap()));
        assert!(time.parse("1430001").is_err());

        let datetime = DateTimeHandler::default();
        let value = datetime.parse("2024-01-15T14:30:00").unwrap().unwrap();
        assert_eq!(
            datetime.format(Some(&value)).unwrap().as_deref(),
            Some("2024-01-15T14:30:00")
        );
    }

    #[test]
    fn test_format_null_and_mismatch() {
        let handler = DateHandler::default();
        assert_eq!(handler.format(None).unwrap(), None);
        assert!(handler.format(Some(&Value::Integer(1))).is_err());
    }

    #[test]
    fn test_round_trip() {
        let handler = DateHandler::configured(&HandlerConfig::new().pattern("%d.%m.%Y")).unwrap();
        for d in [date(1999, 12, 31), date(2000, 2, 29), date(2024, 7, 4)] {
            let text = handler.format(Some(&Value::Date(d))).unwrap().unwrap();
            assert_eq!(handler.parse(&text).unwrap(), Some(Value::Date(d)));
        }
    }
}
