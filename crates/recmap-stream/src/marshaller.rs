//! Bean to record marshalling

use crate::bean::BeanAccessor;
use crate::compiled::{CompiledField, CompiledStream};
use crate::occurrence::OccurrenceTracker;
use crate::{Error, FieldError, Result};
use recmap_format::{Encoding, Format, MarshalledRecord, MarshallingContext, XmlDocument};
use recmap_types::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Formatted text of one field, ready to be written
enum FieldText {
    Single(Option<String>),
    Repeated(Vec<String>),
}

/// Marshals beans into records of one stream.
///
/// After a successful [`marshal`](Self::marshal) exactly one record can be
/// retrieved, any number of times, in the shapes its format supports. The
/// next call replaces it; a failed call leaves nothing to retrieve.
#[derive(Debug)]
pub struct Marshaller {
    stream: Arc<CompiledStream>,
    context: MarshallingContext,
    occurrences: OccurrenceTracker,
    record: Option<MarshalledRecord>,
}

impl Marshaller {
    /// Create a marshaller for a compiled stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] when the stream's format settings cannot
    /// be used by a marshalling context.
    pub fn new(stream: Arc<CompiledStream>) -> Result<Self> {
        let context = MarshallingContext::new(stream.format_config())?;
        let occurrences = OccurrenceTracker::new(stream.occurrence_rules(), stream.is_ordered());
        Ok(Self {
            stream,
            context,
            occurrences,
            record: None,
        })
    }

    pub fn stream(&self) -> &CompiledStream {
        &self.stream
    }

    pub fn occurrences(&self) -> &OccurrenceTracker {
        &self.occurrences
    }

    /// Marshal a bean into the record mapped to its bean type. A stream with
    /// a single record accepts any bean.
    ///
    /// Returns the marshaller so the record can be retrieved in the same
    /// expression: `marshaller.marshal(&bean)?.to_text()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmatchedRecord`] when no record maps the bean type,
    /// [`Error::Occurrence`] when the record may not occur now,
    /// [`Error::InvalidBean`] for field conversion or rule failures and
    /// [`Error::Format`] for fatal context failures.
    pub fn marshal(&mut self, bean: &dyn BeanAccessor) -> Result<&mut Self> {
        self.marshal_bean(bean, None)
    }

    /// Marshal a bean, measuring and writing this one fixed-length record in
    /// `encoding` instead of the stream's encoding.
    ///
    /// # Errors
    ///
    /// As [`marshal`](Self::marshal).
    pub fn marshal_with_encoding(
        &mut self,
        bean: &dyn BeanAccessor,
        encoding: Encoding,
    ) -> Result<&mut Self> {
        self.marshal_bean(bean, Some(encoding))
    }

    /// Marshal a bean into a named record.
    ///
    /// # Errors
    ///
    /// As [`marshal`](Self::marshal), with [`Error::UnmatchedRecord`] for an
    /// unknown record name.
    pub fn marshal_record(&mut self, record: &str, bean: &dyn BeanAccessor) -> Result<&mut Self> {
        self.marshal_named(record, bean, None)
    }

    /// Marshal a bean into a named record written in `encoding`.
    ///
    /// # Errors
    ///
    /// As [`marshal_record`](Self::marshal_record).
    pub fn marshal_record_with_encoding(
        &mut self,
        record: &str,
        bean: &dyn BeanAccessor,
        encoding: Encoding,
    ) -> Result<&mut Self> {
        self.marshal_named(record, bean, Some(encoding))
    }

    fn marshal_bean(
        &mut self,
        bean: &dyn BeanAccessor,
        encoding: Option<Encoding>,
    ) -> Result<&mut Self> {
        let stream = Arc::clone(&self.stream);
        let index = match stream.records() {
            [_] => Some(0),
            records => records
                .iter()
                .position(|r| r.definition().bean_type_name() == bean.bean_type()),
        };
        let Some(index) = index else {
            self.record = None;
            return Err(Error::UnmatchedRecord {
                stream: stream.name().to_string(),
                target: format!("bean type '{}'", bean.bean_type()),
            });
        };
        self.marshal_at(&stream, index, bean, encoding)?;
        Ok(self)
    }

    fn marshal_named(
        &mut self,
        record: &str,
        bean: &dyn BeanAccessor,
        encoding: Option<Encoding>,
    ) -> Result<&mut Self> {
        let stream = Arc::clone(&self.stream);
        let Some(index) = stream.record_index(record) else {
            self.record = None;
            return Err(Error::UnmatchedRecord {
                stream: stream.name().to_string(),
                target: format!("record name '{record}'"),
            });
        };
        self.marshal_at(&stream, index, bean, encoding)?;
        Ok(self)
    }

    fn marshal_at(
        &mut self,
        stream: &CompiledStream,
        index: usize,
        bean: &dyn BeanAccessor,
        encoding: Option<Encoding>,
    ) -> Result<()> {
        self.record = None;
        let record = &stream.records()[index];
        let transition = self.occurrences.check(record.name())?;

        let mut texts = Vec::with_capacity(record.fields().len());
        let mut errors = Vec::new();
        for field in record.fields() {
            match field_text(field, bean) {
                Ok(text) => texts.push(text),
                Err(error) => errors.push(error),
            }
        }
        if !errors.is_empty() {
            debug!(record = %record.name(), error_count = errors.len(), "Rejected bean");
            return Err(Error::InvalidBean {
                record: record.name().to_string(),
                errors,
            });
        }

        let format = stream.format();
        let mut layout = record.layout();
        if let Some(encoding) = encoding {
            layout = layout.encoding(encoding);
        }
        let mut scope = self.context.begin_record(&layout);
        for (field, text) in record.fields().iter().zip(&texts) {
            let layout = field.layout();
            match text {
                FieldText::Single(Some(text)) => scope.set_field_text(&layout, text)?,
                // absent XML nodes are omitted; other formats keep the slot
                FieldText::Single(None) if format == Format::Xml => {}
                FieldText::Single(None) => scope.set_field_text(&layout, "")?,
                FieldText::Repeated(items) => {
                    scope.iterations().push(field.definition().stride(format));
                    for (occurrence, item) in items.iter().enumerate() {
                        scope.iterations().set_index(occurrence);
                        scope.set_field_text(&layout, item)?;
                    }
                    scope.iterations().pop();
                }
            }
        }
        let marshalled = scope.finish()?;

        self.occurrences.commit(transition);
        debug!(
            stream = %stream.name(),
            record = %record.name(),
            "Marshalled record"
        );
        self.record = Some(marshalled);
        Ok(())
    }

    /// The last marshalled record
    pub fn marshalled(&self) -> Option<&MarshalledRecord> {
        self.record.as_ref()
    }

    fn current(&self) -> Result<&MarshalledRecord> {
        self.record.as_ref().ok_or(Error::NothingMarshalled)
    }

    /// Record text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingMarshalled`] before a successful marshal.
    pub fn to_text(&self) -> Result<String> {
        Ok(self.current()?.to_text())
    }

    /// Field texts as an array (fixed-length and delimited streams).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingMarshalled`] before a successful marshal and
    /// a shape mismatch for XML streams.
    pub fn to_array(&self) -> Result<Box<[String]>> {
        Ok(self.current()?.to_array()?)
    }

    /// Field texts as a list (fixed-length and delimited streams).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingMarshalled`] before a successful marshal and
    /// a shape mismatch for XML streams.
    pub fn to_list(&self) -> Result<Vec<String>> {
        Ok(self.current()?.to_list()?)
    }

    /// XML document (XML streams).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingMarshalled`] before a successful marshal and
    /// a shape mismatch for other formats.
    pub fn to_document(&self) -> Result<XmlDocument> {
        Ok(self.current()?.to_document()?)
    }

    /// Check that every mandatory record has been marshalled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Occurrence`] naming a record below its minimum.
    pub fn verify_complete(&self) -> Result<()> {
        Ok(self.occurrences.verify_complete()?)
    }

    /// Start the stream over
    pub fn reset(&mut self) {
        self.occurrences.reset();
        self.record = None;
    }
}

impl std::fmt::Display for Marshaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.record {
            Some(record) => write!(f, "{record}"),
            None => Ok(()),
        }
    }
}

/// Format and check the text of one field
fn field_text(
    field: &CompiledField,
    bean: &dyn BeanAccessor,
) -> std::result::Result<FieldText, FieldError> {
    let definition = field.definition();
    let value = bean.get_property(definition.property_name());

    if definition.is_repeating() {
        let items = match value {
            None => Vec::new(),
            Some(Value::List(items)) => items,
            Some(single) => vec![single],
        };
        if items.len() < definition.min_occurs {
            return Err(FieldError::rule(
                &definition.name,
                "min_occurs",
                format!(
                    "Expected at least {} occurrences, found {}",
                    definition.min_occurs,
                    items.len()
                ),
            ));
        }
        if let Some(max) = definition.max_occurs.filter(|max| items.len() > *max) {
            return Err(FieldError::rule(
                &definition.name,
                "max_occurs",
                format!("Expected at most {max} occurrences, found {}", items.len()),
            ));
        }
        let texts = items
            .iter()
            .map(|item| {
                let text = format_value(field, Some(item))?;
                check_rules(field, text.as_deref())?;
                Ok(text.unwrap_or_default())
            })
            .collect::<std::result::Result<Vec<_>, FieldError>>()?;
        trace!(field = %definition.name, occurrences = texts.len(), "Formatted repeating field");
        return Ok(FieldText::Repeated(texts));
    }

    let text = format_value(field, value.as_ref())?
        .filter(|text| !text.is_empty())
        .or_else(|| definition.default.clone())
        .or_else(|| {
            definition
                .identifier
                .then(|| definition.rules.literal.clone())
                .flatten()
        });
    check_rules(field, text.as_deref())?;
    Ok(FieldText::Single(text))
}

fn format_value(
    field: &CompiledField,
    value: Option<&Value>,
) -> std::result::Result<Option<String>, FieldError> {
    field
        .handler()
        .format(value)
        .map_err(|e| FieldError::conversion(field.name(), &e))
}

fn check_rules(field: &CompiledField, text: Option<&str>) -> std::result::Result<(), FieldError> {
    field
        .rules()
        .check(text)
        .map_err(|violation| FieldError::rule(field.name(), violation.rule, violation.message))
}
