//! Field-level validation rules

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Rules checked against a field's text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRules {
    /// Whether empty or missing text is a violation
    pub required: bool,
    /// Minimum length in characters
    pub min_length: Option<usize>,
    /// Maximum length in characters
    pub max_length: Option<usize>,
    /// Regular expression the whole text must match
    pub regex: Option<String>,
    /// Exact text the field must hold
    pub literal: Option<String>,
}

impl FieldRules {
    /// Create an empty rule set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set min length
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Set max length
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Set regex
    #[must_use]
    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    /// Set literal
    #[must_use]
    pub fn literal(mut self, literal: impl Into<String>) -> Self {
        self.literal = Some(literal.into());
        self
    }

    /// Whether the rules can identify a record
    pub fn identifies(&self) -> bool {
        self.literal.is_some() || self.regex.is_some()
    }

    /// Compile the rules for a field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] for a malformed regex or inverted
    /// length bounds.
    pub fn compile(&self, field: &str) -> Result<CompiledRules> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(Error::InvalidRule {
                    field: field.to_string(),
                    rule: "min_length",
                    message: format!("min_length {min} exceeds max_length {max}"),
                });
            }
        }
        let regex = self
            .regex
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|e| Error::InvalidRule {
                    field: field.to_string(),
                    rule: "regex",
                    message: e.to_string(),
                })
            })
            .transpose()?;
        Ok(CompiledRules {
            rules: self.clone(),
            regex,
        })
    }
}

/// A broken rule, attributable to the rule that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleViolation {
    /// Rule name: `required`, `min_length`, `max_length`, `regex` or `literal`
    pub rule: &'static str,
    pub message: String,
}

impl std::fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.rule)
    }
}

/// Field rules with the regex compiled once
#[derive(Debug, Clone)]
pub struct CompiledRules {
    rules: FieldRules,
    regex: Option<Regex>,
}

impl CompiledRules {
    /// Whether the rules can identify a record
    pub fn identifies(&self) -> bool {
        self.rules.identifies()
    }

    /// Whether present text satisfies the literal and regex rules
    pub fn matches_identifier(&self, text: &str) -> bool {
        self.rules.literal.as_deref().is_none_or(|literal| literal == text)
            && self.regex.as_ref().is_none_or(|re| re.is_match(text))
    }

    /// Check field text. Missing or empty text only breaks `required`.
    pub fn check(&self, text: Option<&str>) -> std::result::Result<(), RuleViolation> {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            return if self.rules.required {
                Err(RuleViolation {
                    rule: "required",
                    message: "Value is required".to_string(),
                })
            } else {
                Ok(())
            };
        };

        let len = text.chars().count();
        if let Some(min) = self.rules.min_length {
            if len < min {
                return Err(RuleViolation {
                    rule: "min_length",
                    message: format!("Value length {len} is less than minimum {min}"),
                });
            }
        }
        if let Some(max) = self.rules.max_length {
            if len > max {
                return Err(RuleViolation {
                    rule: "max_length",
                    message: format!("Value length {len} exceeds maximum {max}"),
                });
            }
        }
        if let Some(literal) = &self.rules.literal {
            if literal != text {
                return Err(RuleViolation {
                    rule: "literal",
                    message: format!("Value '{text}' does not equal '{literal}'"),
                });
            }
        }
        if let Some(re) = &self.regex {
            if !re.is_match(text) {
                return Err(RuleViolation {
                    rule: "regex",
                    message: format!(
                        "Value '{text}' does not match pattern '{}'",
                        self.rules.regex.as_deref().unwrap_or_default()
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        let rules = FieldRules::new().required().compile("f").unwrap();
        assert_eq!(rules.check(None).unwrap_err().rule, "required");
        assert_eq!(rules.check(Some("")).unwrap_err().rule, "required");
        assert!(rules.check(Some("x")).is_ok());

        let optional = FieldRules::new().min_length(3).compile("f").unwrap();
        assert!(optional.check(None).is_ok());
    }

    #[test]
    fn test_length_counts_characters() {
        let rules = FieldRules::new().min_length(2).max_length(3).compile("f").unwrap();
        assert_eq!(rules.check(Some("a")).unwrap_err().rule, "min_length");
        assert!(rules.check(Some("éé")).is_ok());
        assert_eq!(rules.check(Some("abcd")).unwrap_err().rule, "max_length");
    }

    #[test]
    fn test_regex_matches_whole_text() {
        let rules = FieldRules::new().regex("[0-9]+").compile("f").unwrap();
        assert!(rules.check(Some("123")).is_ok());
        let violation = rules.check(Some("12a")).unwrap_err();
        assert_eq!(violation.rule, "regex");
        assert!(violation.to_string().contains("[0-9]+"));
    }

    #[test]
    fn test_literal_and_identification() {
        let rules = FieldRules::new().literal("H").compile("type").unwrap();
        assert!(rules.identifies());
        assert!(rules.matches_identifier("H"));
        assert!(!rules.matches_identifier("D"));
        assert_eq!(rules.check(Some("D")).unwrap_err().rule, "literal");

        let plain = FieldRules::new().compile("x").unwrap();
        assert!(!plain.identifies());
        assert!(plain.matches_identifier("anything"));
    }

    #[test]
    fn test_invalid_rules_rejected() {
        assert!(matches!(
            FieldRules::new().regex("(").compile("f"),
            Err(Error::InvalidRule { rule: "regex", .. })
        ));
        assert!(matches!(
            FieldRules::new().min_length(4).max_length(2).compile("f"),
            Err(Error::InvalidRule { rule: "min_length", .. })
        ));
    }
}
