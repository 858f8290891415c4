//! Delimited and CSV records.
//!
//! Positions and `until` offsets count tokens. Plain delimited records never
//! quote; CSV records quote fields that need it.

use crate::config::FormatConfig;
use crate::context::{FieldCache, FieldLayout, IterationStack, RawRecord, RecordLayout};
use crate::encoding::Encoding;
use crate::record::MarshalledRecord;
use crate::{Error, Format, Result};
use tracing::{debug, trace};

/// Unmarshalling side of a delimited or CSV stream
#[derive(Debug)]
pub struct DelimitedUnmarshallingContext {
    format: Format,
    delimiter: u8,
    quote: u8,
    tokens: Option<Vec<String>>,
    cache: FieldCache,
    iterations: IterationStack,
}

impl DelimitedUnmarshallingContext {
    /// Create a context for the configured format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for non-ASCII delimiter or quote characters.
    pub fn new(config: &FormatConfig) -> Result<Self> {
        Ok(Self {
            format: config.format,
            delimiter: config.delimiter_u8()?,
            quote: config.quote_u8()?,
            tokens: None,
            cache: FieldCache::default(),
            iterations: IterationStack::default(),
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Install a record from line text or pre-split tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenize`] for malformed lines and
    /// [`Error::UnsupportedRecord`] for XML nodes.
    pub fn set_record_value(&mut self, raw: RawRecord) -> Result<()> {
        let tokens = match raw {
            RawRecord::Line(text) => self.tokenize(&text)?,
            RawRecord::Tokens(tokens) => tokens,
            RawRecord::Node(_) => {
                return Err(Error::UnsupportedRecord {
                    format: self.format,
                    expected: "line or tokens",
                });
            }
        };
        trace!(token_count = tokens.len(), "Delimited record set");
        self.tokens = Some(tokens);
        self.cache.clear();
        self.iterations.clear();
        Ok(())
    }

    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .quoting(self.format == Format::Csv)
            .from_reader(text.as_bytes());

        match reader.records().next() {
            Some(record) => {
                let record = record.map_err(|e| Error::Tokenize(e.to_string()))?;
                Ok(record.iter().map(str::to_string).collect())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Token at an ordinal position, or `None` past the last token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotSet`] outside a record.
    pub fn field_text(&mut self, name: &str, position: i32, until: i32) -> Result<Option<String>> {
        let tokens = self
            .tokens
            .as_deref()
            .ok_or_else(|| Error::RecordNotSet(name.to_string()))?;

        let count = i64::try_from(tokens.len()).unwrap_or(i64::MAX);
        let index = if position < 0 {
            self.iterations.adjust(count + i64::from(position))
        } else {
            let index = self.iterations.adjust(i64::from(position));
            if index >= count + i64::from(until) {
                return Ok(None);
            }
            index
        };
        if index < 0 || index >= count {
            return Ok(None);
        }

        // 0 <= index < count
        let text = tokens[index as usize].clone();
        self.cache.insert(name, &text);
        Ok(Some(text))
    }

    /// Text already resolved for a field in the current record
    pub fn cached_field_text(&self, name: &str) -> Option<&str> {
        self.cache.get(name)
    }

    pub fn iterations(&mut self) -> &mut IterationStack {
        &mut self.iterations
    }

    /// End the current record
    pub fn clear(&mut self) {
        self.tokens = None;
        self.cache.clear();
        self.iterations.clear();
    }
}

/// Marshalling side of a delimited or CSV stream
#[derive(Debug)]
pub struct DelimitedMarshallingContext {
    format: Format,
    encoding: Encoding,
    delimiter: u8,
    quote: u8,
    tokens: Option<Vec<String>>,
    layout_length: usize,
    iterations: IterationStack,
}

impl DelimitedMarshallingContext {
    /// Create a context for the configured format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for non-ASCII delimiter or quote characters.
    pub fn new(config: &FormatConfig) -> Result<Self> {
        Ok(Self {
            format: config.format,
            encoding: config.encoding,
            delimiter: config.delimiter_u8()?,
            quote: config.quote_u8()?,
            tokens: None,
            layout_length: 0,
            iterations: IterationStack::default(),
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub(crate) fn begin_record(&mut self, layout: &RecordLayout<'_>) {
        self.tokens = Some(Vec::with_capacity(layout.length));
        self.layout_length = layout.length;
        self.iterations.clear();
    }

    pub(crate) fn set_field_text(&mut self, field: &FieldLayout<'_>, text: &str) -> Result<()> {
        if self.tokens.is_none() {
            return Err(Error::RecordNotSet(field.name.to_string()));
        }
        self.encoding.encoded_len(text)?;
        if self.format == Format::Delimited
            && (text.contains(char::from(self.delimiter)) || text.contains(['\n', '\r']))
        {
            return Err(Error::addressing(
                field.name,
                "text contains the delimiter or a line break and the format does not quote",
            ));
        }

        let index = if field.position < 0 {
            let count = i64::try_from(self.layout_length).unwrap_or(i64::MAX);
            self.iterations.adjust(count + i64::from(field.position))
        } else {
            self.iterations.adjust(i64::from(field.position))
        };
        let index = usize::try_from(index).map_err(|_| {
            Error::addressing(
                field.name,
                format!(
                    "position {} resolves before the first of {} tokens",
                    field.position, self.layout_length
                ),
            )
        })?;

        let tokens = self
            .tokens
            .as_mut()
            .ok_or_else(|| Error::RecordNotSet(field.name.to_string()))?;
        if tokens.len() <= index {
            tokens.resize(index + 1, String::new());
        }
        tokens[index] = text.to_string();
        trace!(field = field.name, index, "Wrote delimited field");
        Ok(())
    }

    pub(crate) fn iterations(&mut self) -> &mut IterationStack {
        &mut self.iterations
    }

    pub(crate) fn end_record(&mut self) -> Result<MarshalledRecord> {
        let tokens = self
            .tokens
            .take()
            .ok_or_else(|| Error::RecordNotSet("end of record".to_string()))?;
        self.iterations.clear();

        let quote_style = if self.format == Format::Csv {
            csv::QuoteStyle::Necessary
        } else {
            csv::QuoteStyle::Never
        };
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .quote_style(quote_style)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        csv_writer
            .write_record(&tokens)
            .map_err(|e| Error::Tokenize(e.to_string()))?;
        let bytes = csv_writer
            .into_inner()
            .map_err(|e| Error::Tokenize(e.to_string()))?;

        let mut text = String::from_utf8(bytes).map_err(|e| Error::Tokenize(e.to_string()))?;
        if text.ends_with('\n') {
            text.pop();
        }

        debug!(format = %self.format, token_count = tokens.len(), "Finished delimited record");
        Ok(MarshalledRecord::Delimited {
            format: self.format,
            text,
            tokens,
        })
    }

    pub(crate) fn discard(&mut self) {
        self.tokens = None;
        self.iterations.clear();
    }
}
