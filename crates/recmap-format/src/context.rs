//! Format contexts: the per-direction record holders shared by all formats.
//!
//! The format variant is chosen once per stream when a context is created;
//! every field of every record then goes straight to that variant's
//! addressing code.

use crate::config::FormatConfig;
use crate::delimited::{DelimitedMarshallingContext, DelimitedUnmarshallingContext};
use crate::encoding::Encoding;
use crate::fixed::{FixedLengthMarshallingContext, FixedLengthUnmarshallingContext};
use crate::node::{XmlBinding, XmlNode};
use crate::record::MarshalledRecord;
use crate::xml::{XmlMarshallingContext, XmlUnmarshallingContext};
use crate::{Format, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed-length text alignment inside its padded range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Justify {
    /// Text first, padding after
    #[default]
    Left,
    /// Padding first, text after
    Right,
}

/// Where one field sits inside a record
#[derive(Debug, Clone, Copy)]
pub struct FieldLayout<'a> {
    /// Field name, unique within the record
    pub name: &'a str,
    /// Absolute index from the start, or an offset from the end when negative
    pub position: i32,
    /// Length in encoded bytes for fixed-length records; `None` is unbounded
    pub length: Option<usize>,
    /// Upper bound of the position as an offset from the record end
    pub until: i32,
    /// Fixed-length padding character
    pub padding: char,
    /// Fixed-length justification
    pub justify: Justify,
    /// XML binding; `None` binds to a child element named after the field
    pub xml: Option<&'a XmlBinding>,
}

impl<'a> FieldLayout<'a> {
    /// Create a layout at position 0, unbounded, until 0
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            position: 0,
            length: None,
            until: 0,
            padding: ' ',
            justify: Justify::Left,
            xml: None,
        }
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

    /// Set until offset
    pub fn until(mut self, until: i32) -> Self {
        self.until = until;
        self
    }

    /// Set padding and justification
    pub fn padded(mut self, padding: char, justify: Justify) -> Self {
        self.padding = padding;
        self.justify = justify;
        self
    }

    /// Set the XML binding
    pub fn xml(mut self, binding: &'a XmlBinding) -> Self {
        self.xml = Some(binding);
        self
    }
}

/// Record-level layout needed to start marshalling a record
#[derive(Debug, Clone, Copy)]
pub struct RecordLayout<'a> {
    /// Record name
    pub name: &'a str,
    /// Length negative field positions resolve against
    pub length: usize,
    /// XML binding of the record element
    pub xml: Option<&'a XmlBinding>,
    /// Encoding for this record only, overriding the stream's. Fixed-length
    /// records are the only ones measured in bytes, so other formats ignore it.
    pub encoding: Option<Encoding>,
}

impl<'a> RecordLayout<'a> {
    /// Create a layout with no negative-position length and no XML binding
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            length: 0,
            xml: None,
            encoding: None,
        }
    }

    /// Set the encoding of this record
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set the layout length
    pub fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Set the XML binding
    pub fn xml(mut self, binding: &'a XmlBinding) -> Self {
        self.xml = Some(binding);
        self
    }
}

/// A raw record handed over by an external reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    /// One line of record text
    Line(String),
    /// An already tokenized delimited record
    Tokens(Vec<String>),
    /// A parsed XML record element
    Node(XmlNode),
}

impl RawRecord {
    /// Wrap line text
    pub fn line(text: impl Into<String>) -> Self {
        Self::Line(text.into())
    }

    /// Wrap tokens
    pub fn tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Tokens(tokens.into_iter().map(Into::into).collect())
    }

    /// Describe the variant for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            RawRecord::Line(_) => "line",
            RawRecord::Tokens(_) => "tokens",
            RawRecord::Node(_) => "node",
        }
    }
}

/// Stack of active repetitions used to adjust field positions.
///
/// Each level contributes `index * stride` to a position, so the nth
/// occurrence of a repeating fixed-length field of length 5 at position 10
/// lands at `10 + 5n`.
#[derive(Debug, Clone, Default)]
pub struct IterationStack {
    levels: Vec<(usize, usize)>,
}

impl IterationStack {
    /// Enter a repetition with the given stride
    pub fn push(&mut self, stride: usize) {
        self.levels.push((stride, 0));
    }

    /// Set the occurrence index of the innermost repetition
    pub fn set_index(&mut self, index: usize) {
        if let Some(level) = self.levels.last_mut() {
            level.1 = index;
        }
    }

    /// Leave the innermost repetition
    pub fn pop(&mut self) {
        self.levels.pop();
    }

    /// Occurrence index of the innermost repetition
    pub fn current_index(&self) -> usize {
        self.levels.last().map_or(0, |level| level.1)
    }

    /// Drop all levels
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Adjust a resolved position for the active repetitions
    pub fn adjust(&self, position: i64) -> i64 {
        self.levels.iter().fold(position, |acc, &(stride, index)| {
            let offset = i64::try_from(stride.saturating_mul(index)).unwrap_or(i64::MAX);
            acc.saturating_add(offset)
        })
    }
}

/// Name to text cache of the fields already resolved in the current record
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldCache {
    texts: HashMap<String, String>,
}

impl FieldCache {
    pub(crate) fn insert(&mut self, name: &str, text: &str) {
        self.texts.insert(name.to_string(), text.to_string());
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }

    pub(crate) fn clear(&mut self) {
        self.texts.clear();
    }
}

/// Unmarshalling context for one stream
#[derive(Debug)]
pub enum UnmarshallingContext {
    FixedLength(FixedLengthUnmarshallingContext),
    Delimited(DelimitedUnmarshallingContext),
    Xml(XmlUnmarshallingContext),
}

impl UnmarshallingContext {
    /// Create the context variant for the configured format.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unusable delimiter or quote chars.
    pub fn new(config: &FormatConfig) -> Result<Self> {
        Ok(match config.format {
            Format::FixedLength => {
                Self::FixedLength(FixedLengthUnmarshallingContext::new(config.encoding))
            }
            Format::Delimited | Format::Csv => {
                Self::Delimited(DelimitedUnmarshallingContext::new(config)?)
            }
            Format::Xml => Self::Xml(XmlUnmarshallingContext::new()),
        })
    }

    /// The format of this context
    pub fn format(&self) -> Format {
        match self {
            Self::FixedLength(_) => Format::FixedLength,
            Self::Delimited(c) => c.format(),
            Self::Xml(_) => Format::Xml,
        }
    }

    /// Install a new record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the raw record kind does not fit the format, the
    /// line cannot be tokenized, or the text cannot be encoded.
    pub fn set_record_value(&mut self, raw: RawRecord) -> Result<()> {
        match self {
            Self::FixedLength(c) => c.set_record_value(raw),
            Self::Delimited(c) => c.set_record_value(raw),
            Self::Xml(c) => c.set_record_value(raw),
        }
    }

    /// Resolve and cache the text of a field, or `None` if the record does
    /// not contain it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RecordNotSet`] outside a record and
    /// [`crate::Error::Encoding`] when a fixed-length slice cannot be decoded.
    pub fn field_text(&mut self, field: &FieldLayout<'_>) -> Result<Option<String>> {
        match self {
            Self::FixedLength(c) => {
                c.field_text(field.name, field.position, field.length, field.until)
            }
            Self::Delimited(c) => c.field_text(field.name, field.position, field.until),
            Self::Xml(c) => c.field_text(field.name, field.xml),
        }
    }

    /// Text already resolved for a field in the current record
    pub fn cached_field_text(&self, name: &str) -> Option<&str> {
        match self {
            Self::FixedLength(c) => c.cached_field_text(name),
            Self::Delimited(c) => c.cached_field_text(name),
            Self::Xml(c) => c.cached_field_text(name),
        }
    }

    /// Mutable access to the repetition stack
    pub fn iterations(&mut self) -> &mut IterationStack {
        match self {
            Self::FixedLength(c) => c.iterations(),
            Self::Delimited(c) => c.iterations(),
            Self::Xml(c) => c.iterations(),
        }
    }

    /// End the current record
    pub fn clear(&mut self) {
        match self {
            Self::FixedLength(c) => c.clear(),
            Self::Delimited(c) => c.clear(),
            Self::Xml(c) => c.clear(),
        }
    }
}

/// Marshalling context for one stream
#[derive(Debug)]
pub enum MarshallingContext {
    FixedLength(FixedLengthMarshallingContext),
    Delimited(DelimitedMarshallingContext),
    Xml(XmlMarshallingContext),
}

impl MarshallingContext {
    /// Create the context variant for the configured format.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unusable delimiter, quote or filler
    /// characters.
    pub fn new(config: &FormatConfig) -> Result<Self> {
        Ok(match config.format {
            Format::FixedLength => Self::FixedLength(FixedLengthMarshallingContext::new(config)?),
            Format::Delimited | Format::Csv => {
                Self::Delimited(DelimitedMarshallingContext::new(config)?)
            }
            Format::Xml => Self::Xml(XmlMarshallingContext::new()),
        })
    }

    /// The format of this context
    pub fn format(&self) -> Format {
        match self {
            Self::FixedLength(_) => Format::FixedLength,
            Self::Delimited(c) => c.format(),
            Self::Xml(_) => Format::Xml,
        }
    }

    /// Start a record. The returned scope discards the partial record unless
    /// [`RecordScope::finish`] is called.
    pub fn begin_record(&mut self, layout: &RecordLayout<'_>) -> RecordScope<'_> {
        match self {
            Self::FixedLength(c) => c.begin_record(layout),
            Self::Delimited(c) => c.begin_record(layout),
            Self::Xml(c) => c.begin_record(layout),
        }
        RecordScope {
            context: self,
            finished: false,
        }
    }

    fn set_field_text(&mut self, field: &FieldLayout<'_>, text: &str) -> Result<()> {
        match self {
            Self::FixedLength(c) => c.set_field_text(field, text),
            Self::Delimited(c) => c.set_field_text(field, text),
            Self::Xml(c) => c.set_field_text(field, text),
        }
    }

    fn iterations(&mut self) -> &mut IterationStack {
        match self {
            Self::FixedLength(c) => c.iterations(),
            Self::Delimited(c) => c.iterations(),
            Self::Xml(c) => c.iterations(),
        }
    }

    fn end_record(&mut self) -> Result<MarshalledRecord> {
        match self {
            Self::FixedLength(c) => c.end_record(),
            Self::Delimited(c) => c.end_record(),
            Self::Xml(c) => c.end_record(),
        }
    }

    fn discard(&mut self) {
        match self {
            Self::FixedLength(c) => c.discard(),
            Self::Delimited(c) => c.discard(),
            Self::Xml(c) => c.discard(),
        }
    }
}

/// An open record being marshalled.
///
/// Dropping the scope without calling [`finish`](Self::finish) discards the
/// partial record, so an error part way through a record leaves nothing
/// behind.
#[derive(Debug)]
pub struct RecordScope<'c> {
    context: &'c mut MarshallingContext,
    finished: bool,
}

impl RecordScope<'_> {
    /// Write a field's text into the record.
    ///
    /// # Errors
    ///
    /// Returns an addressing or encoding error when the text cannot be
    /// placed.
    pub fn set_field_text(&mut self, field: &FieldLayout<'_>, text: &str) -> Result<()> {
        self.context.set_field_text(field, text)
    }

    /// Mutable access to the repetition stack
    pub fn iterations(&mut self) -> &mut IterationStack {
        self.context.iterations()
    }

    /// Freeze the record.
    ///
    /// # Errors
    ///
    /// Returns an encoding error if the assembled buffer is not valid text.
    pub fn finish(mut self) -> Result<MarshalledRecord> {
        self.finished = true;
        self.context.end_record()
    }
}

impl Drop for RecordScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.context.discard();
        }
    }
}
