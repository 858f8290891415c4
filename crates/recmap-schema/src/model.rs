//! Stream, record and field descriptors

use crate::rules::FieldRules;
use crate::{Error, Result};
use recmap_format::{
    Encoding, FieldLayout, Format, FormatConfig, Justify, XmlBinding, XmlKind,
};
use recmap_types::HandlerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

fn default_true() -> bool {
    true
}

fn default_min_occurs() -> usize {
    1
}

fn default_max_occurs() -> Option<usize> {
    Some(1)
}

fn default_type() -> String {
    "string".to_string()
}

fn default_padding() -> char {
    ' '
}

/// A complete stream mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDefinition {
    pub name: String,
    pub format: Format,
    #[serde(default)]
    pub encoding: Encoding,
    /// Field delimiter; the format default when `None`
    #[serde(default)]
    pub delimiter: Option<char>,
    /// CSV quote character; `"` when `None`
    #[serde(default)]
    pub quote: Option<char>,
    /// Fixed-length gap filler
    #[serde(default = "default_padding")]
    pub filler: char,
    /// Whether records must appear in declaration order
    #[serde(default = "default_true")]
    pub ordered: bool,
    pub records: Vec<RecordDefinition>,
}

impl StreamDefinition {
    /// Create an ordered stream with no records
    pub fn new(name: impl Into<String>, format: Format) -> Self {
        Self {
            name: name.into(),
            format,
            encoding: Encoding::default(),
            delimiter: None,
            quote: None,
            filler: ' ',
            ordered: true,
            records: Vec::new(),
        }
    }

    /// Set encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Set quote character
    pub fn quote(mut self, quote: char) -> Self {
        self.quote = Some(quote);
        self
    }

    /// Set fixed-length filler
    pub fn filler(mut self, filler: char) -> Self {
        self.filler = filler;
        self
    }

    /// Set strict ordering
    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Add a record
    pub fn record(mut self, record: RecordDefinition) -> Self {
        self.records.push(record);
        self
    }

    /// Find a record by name
    pub fn find_record(&self, name: &str) -> Option<&RecordDefinition> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Format context configuration for this stream
    pub fn format_config(&self) -> FormatConfig {
        let mut config = FormatConfig::new(self.format)
            .encoding(self.encoding)
            .filler(self.filler);
        if let Some(delimiter) = self.delimiter {
            config = config.delimiter(delimiter);
        }
        if let Some(quote) = self.quote {
            config = config.quote(quote);
        }
        config
    }

    /// Check the tree for inconsistencies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDefinition`] naming the first offending
    /// stream, record or field.
    pub fn validate(&self) -> Result<()> {
        let path = format!("stream '{}'", self.name);
        if self.records.is_empty() {
            return Err(Error::invalid(path, "stream declares no records"));
        }
        if matches!(self.format, Format::Delimited | Format::Csv) {
            let config = self.format_config();
            for (what, c) in [("delimiter", config.delimiter), ("quote", config.quote)] {
                if !c.is_ascii() {
                    return Err(Error::invalid(
                        &path,
                        format!("{what} '{c}' must be an ASCII character"),
                    ));
                }
            }
        }

        let mut names = HashSet::new();
        for record in &self.records {
            if !names.insert(record.name.as_str()) {
                return Err(Error::invalid(
                    &path,
                    format!("duplicate record '{}'", record.name),
                ));
            }
            record.validate(self.format, &path)?;
        }
        if self.records.len() > 1 && self.format != Format::Xml {
            if let Some(record) = self.records.iter().find(|r| !r.is_identifiable()) {
                debug!(
                    stream = %self.name,
                    record = %record.name,
                    "Record has no identifier field; it only matches by position"
                );
            }
        }
        Ok(())
    }
}

/// A record mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDefinition {
    pub name: String,
    /// Bean type this record maps; the record name when `None`
    #[serde(default)]
    pub bean_type: Option<String>,
    #[serde(default = "default_min_occurs")]
    pub min_occurs: usize,
    /// Upper occurrence bound; `None` is unbounded
    #[serde(default = "default_max_occurs")]
    pub max_occurs: Option<usize>,
    /// Declared fixed record length in encoded bytes
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub xml: Option<XmlBinding>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl RecordDefinition {
    /// Create a record occurring exactly once
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bean_type: None,
            min_occurs: 1,
            max_occurs: Some(1),
            length: None,
            xml: None,
            fields: Vec::new(),
        }
    }

    /// Set bean type
    pub fn bean_type(mut self, bean_type: impl Into<String>) -> Self {
        self.bean_type = Some(bean_type.into());
        self
    }

    /// Set occurrence bounds
    pub fn occurs(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    /// Set declared record length
    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Set XML binding
    pub fn xml(mut self, binding: XmlBinding) -> Self {
        self.xml = Some(binding);
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Bean type name this record maps
    pub fn bean_type_name(&self) -> &str {
        self.bean_type.as_deref().unwrap_or(&self.name)
    }

    /// Whether any field identifies the record
    pub fn is_identifiable(&self) -> bool {
        self.fields.iter().any(|f| f.identifier)
    }

    /// Length negative field positions resolve against when marshalling.
    ///
    /// A declared fixed record length wins. Otherwise it is the extent of the
    /// non-negative fields plus the largest distance from the end among the
    /// negative ones, in bytes for fixed-length and tokens for delimited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDefinition`] when the layout does not fit in
    /// a `usize`.
    pub fn layout_length(&self, format: Format) -> Result<usize> {
        if format == Format::Xml {
            return Ok(0);
        }
        if let (Format::FixedLength, Some(length)) = (format, self.length) {
            return Ok(length);
        }
        let overflow = || {
            Error::invalid(format!("record '{}'", self.name), "field layout overflows")
        };
        let mut extent = 0;
        let mut tail = 0;
        for field in &self.fields {
            match usize::try_from(field.position) {
                Ok(position) => {
                    let end = field
                        .stride(format)
                        .checked_mul(field.layout_count())
                        .and_then(|span| span.checked_add(position))
                        .ok_or_else(overflow)?;
                    extent = extent.max(end);
                }
                Err(_) => tail = tail.max(field.position.unsigned_abs() as usize),
            }
        }
        extent.checked_add(tail).ok_or_else(overflow)
    }

    fn validate(&self, format: Format, parent: &str) -> Result<()> {
        let path = format!("{parent} record '{}'", self.name);
        check_occurs(&path, self.min_occurs, self.max_occurs)?;

        let mut names = HashSet::new();
        let mut text_fields = 0;
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(Error::invalid(
                    &path,
                    format!("duplicate field '{}'", field.name),
                ));
            }
            if field.xml.as_ref().is_some_and(|b| b.kind == XmlKind::Text) {
                text_fields += 1;
            }
            field.validate(format, &path)?;
        }
        if format == Format::Xml && text_fields > 1 {
            return Err(Error::invalid(path, "more than one field binds to element text"));
        }
        self.layout_length(format)?;
        Ok(())
    }
}

/// A field mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    /// Bean property; the field name when `None`
    #[serde(default)]
    pub property: Option<String>,
    /// Registered type handler name
    #[serde(rename = "type", default = "default_type")]
    pub type_name: String,
    #[serde(flatten)]
    pub handler: HandlerConfig,
    /// Index from the start, or offset from the end when negative
    #[serde(default)]
    pub position: i32,
    /// Fixed-length size in encoded bytes; `None` is unbounded
    #[serde(default)]
    pub length: Option<usize>,
    /// Offset from the record end bounding the position (always <= 0)
    #[serde(default)]
    pub until: i32,
    #[serde(default = "default_min_occurs")]
    pub min_occurs: usize,
    /// Upper repeat bound; `None` is unbounded
    #[serde(default = "default_max_occurs")]
    pub max_occurs: Option<usize>,
    #[serde(default = "default_padding")]
    pub padding: char,
    #[serde(default)]
    pub justify: Justify,
    #[serde(flatten)]
    pub rules: FieldRules,
    /// Text used when the bean property is null on marshal or the field is
    /// empty on unmarshal
    #[serde(default)]
    pub default: Option<String>,
    /// Whether the field identifies its record
    #[serde(default)]
    pub identifier: bool,
    #[serde(default)]
    pub xml: Option<XmlBinding>,
}

impl FieldDefinition {
    /// Create a required-once string field at position 0
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property: None,
            type_name: default_type(),
            handler: HandlerConfig::default(),
            position: 0,
            length: None,
            until: 0,
            min_occurs: 1,
            max_occurs: Some(1),
            padding: ' ',
            justify: Justify::Left,
            rules: FieldRules::default(),
            default: None,
            identifier: false,
            xml: None,
        }
    }

    /// Set bean property
    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    /// Set type handler name
    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Set handler pattern
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.handler = self.handler.pattern(pattern);
        self
    }

    /// Set handler leniency
    pub fn lenient(mut self) -> Self {
        self.handler = self.handler.lenient(true);
        self
    }

    /// Set position
    pub fn at(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Set length
    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Set until
    pub fn until(mut self, until: i32) -> Self {
        self.until = until;
        self
    }

    /// Set repeat bounds
    pub fn occurs(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    /// Set padding and justification
    pub fn padded(mut self, padding: char, justify: Justify) -> Self {
        self.padding = padding;
        self.justify = justify;
        self
    }

    /// Replace the validation rules
    pub fn rules(mut self, rules: FieldRules) -> Self {
        self.rules = rules;
        self
    }

    /// Mark required
    pub fn required(mut self) -> Self {
        self.rules = self.rules.required();
        self
    }

    /// Require an exact value
    pub fn literal(mut self, literal: impl Into<String>) -> Self {
        self.rules = self.rules.literal(literal);
        self
    }

    /// Require a regex match
    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.rules = self.rules.regex(pattern);
        self
    }

    /// Set default text
    pub fn default_text(mut self, text: impl Into<String>) -> Self {
        self.default = Some(text.into());
        self
    }

    /// Mark as a record identifier
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    /// Set XML binding
    pub fn xml(mut self, binding: XmlBinding) -> Self {
        self.xml = Some(binding);
        self
    }

    /// Bean property name
    pub fn property_name(&self) -> &str {
        self.property.as_deref().unwrap_or(&self.name)
    }

    /// Whether the field maps to a list of values
    pub fn is_repeating(&self) -> bool {
        self.max_occurs != Some(1)
    }

    /// Distance between occurrences of a repeating field
    pub fn stride(&self, format: Format) -> usize {
        match format {
            Format::FixedLength => self.length.unwrap_or(0),
            Format::Delimited | Format::Csv | Format::Xml => 1,
        }
    }

    /// Occurrences reserved in a computed layout
    fn layout_count(&self) -> usize {
        self.max_occurs.unwrap_or(self.min_occurs).max(1)
    }

    /// Addressing view used by the format contexts
    pub fn layout(&self) -> FieldLayout<'_> {
        FieldLayout {
            name: &self.name,
            position: self.position,
            length: self.length,
            until: self.until,
            padding: self.padding,
            justify: self.justify,
            xml: self.xml.as_ref(),
        }
    }

    fn validate(&self, format: Format, parent: &str) -> Result<()> {
        let path = format!("{parent} field '{}'", self.name);
        if self.until > 0 {
            return Err(Error::invalid(
                path,
                format!("until {} must not be positive", self.until),
            ));
        }
        check_occurs(&path, self.min_occurs, self.max_occurs)?;
        if self.identifier && !self.rules.identifies() {
            return Err(Error::invalid(path, "identifier field needs a literal or regex"));
        }
        if self.length == Some(0) {
            return Err(Error::invalid(path, "length must be positive"));
        }
        if self.is_repeating() {
            if format == Format::FixedLength && self.length.is_none() {
                return Err(Error::invalid(path, "repeating fixed-length field needs a length"));
            }
            if self.position < 0 {
                return Err(Error::invalid(path, "repeating field cannot use a negative position"));
            }
            if format == Format::Xml
                && self.xml.as_ref().is_some_and(|b| b.kind != XmlKind::Element)
            {
                return Err(Error::invalid(path, "only element fields can repeat"));
            }
        }
        Ok(())
    }
}

fn check_occurs(path: &str, min: usize, max: Option<usize>) -> Result<()> {
    match max {
        Some(0) => Err(Error::invalid(path, "max_occurs must be at least 1")),
        Some(max) if min > max => Err(Error::invalid(
            path,
            format!("min_occurs {min} exceeds max_occurs {max}"),
        )),
        _ => Ok(()),
    }
}
