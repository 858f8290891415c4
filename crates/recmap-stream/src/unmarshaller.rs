//! Record to bean unmarshalling

use crate::bean::{BeanAccessor, MapBean};
use crate::compiled::{CompiledField, CompiledRecord, CompiledStream};
use crate::occurrence::OccurrenceTracker;
use crate::{Error, FieldError, Result};
use recmap_format::{Format, Justify, RawRecord, UnmarshallingContext};
use recmap_types::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Unmarshals raw records of one stream into beans.
///
/// Each call identifies the record, checks that it may occur now, then
/// extracts, parses and validates every field. Field failures are collected
/// into a single [`Error::InvalidRecord`]; the occurrence is only counted
/// when the whole record succeeds.
#[derive(Debug)]
pub struct Unmarshaller {
    stream: Arc<CompiledStream>,
    context: UnmarshallingContext,
    occurrences: OccurrenceTracker,
    record_name: Option<String>,
}

impl Unmarshaller {
    /// Create an unmarshaller for a compiled stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] when the stream's format settings cannot
    /// be used by an unmarshalling context.
    pub fn new(stream: Arc<CompiledStream>) -> Result<Self> {
        let context = UnmarshallingContext::new(stream.format_config())?;
        let occurrences = OccurrenceTracker::new(stream.occurrence_rules(), stream.is_ordered());
        Ok(Self {
            stream,
            context,
            occurrences,
            record_name: None,
        })
    }

    pub fn stream(&self) -> &CompiledStream {
        &self.stream
    }

    pub fn occurrences(&self) -> &OccurrenceTracker {
        &self.occurrences
    }

    /// Name of the record matched by the last call, including a call that
    /// failed after identification
    pub fn record_name(&self) -> Option<&str> {
        self.record_name.as_deref()
    }

    /// Raw text of a field of the last record, as extracted
    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.context.cached_field_text(name)
    }

    /// Unmarshal a record into a new [`MapBean`] of the record's bean type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmatchedRecord`] when no record matches,
    /// [`Error::Occurrence`] when the record may not occur now,
    /// [`Error::InvalidRecord`] for field conversion or rule failures and
    /// [`Error::Format`] for fatal context failures.
    pub fn unmarshal(&mut self, raw: RawRecord) -> Result<MapBean> {
        let stream = Arc::clone(&self.stream);
        let (index, values) = self.read(&stream, raw)?;
        let mut bean = MapBean::new(stream.records()[index].definition().bean_type_name());
        for (property, value) in values {
            bean.set_property(property, value);
        }
        Ok(bean)
    }

    /// Unmarshal a record into a caller-supplied bean. The bean is only
    /// touched when the record succeeds.
    ///
    /// # Errors
    ///
    /// As [`unmarshal`](Self::unmarshal).
    pub fn unmarshal_into(&mut self, raw: RawRecord, bean: &mut dyn BeanAccessor) -> Result<()> {
        let stream = Arc::clone(&self.stream);
        let (_, values) = self.read(&stream, raw)?;
        for (property, value) in values {
            bean.set_property(property, value);
        }
        Ok(())
    }

    /// Check that every mandatory record has been read.
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
        self.context.clear();
        self.record_name = None;
    }

    fn read<'s>(
        &mut self,
        stream: &'s CompiledStream,
        raw: RawRecord,
    ) -> Result<(usize, Vec<(&'s str, Option<Value>)>)> {
        self.record_name = None;
        let element = match &raw {
            RawRecord::Node(node) => Some((node.namespace.clone(), node.name.clone())),
            _ => None,
        };
        let target = describe(&raw);
        self.context.set_record_value(raw)?;

        let index = self.identify(stream, element.as_ref(), target)?;
        let record = &stream.records()[index];
        self.record_name = Some(record.name().to_string());
        let transition = self.occurrences.check(record.name())?;

        let format = stream.format();
        let mut values = Vec::with_capacity(record.fields().len());
        let mut errors = Vec::new();
        for field in record.fields() {
            match self.read_field(format, field)? {
                Ok(value) => values.push((field.definition().property_name(), value)),
                Err(error) => errors.push(error),
            }
        }
        if !errors.is_empty() {
            debug!(record = %record.name(), error_count = errors.len(), "Rejected record");
            return Err(Error::InvalidRecord {
                record: record.name().to_string(),
                errors,
            });
        }

        self.occurrences.commit(transition);
        debug!(stream = %stream.name(), record = %record.name(), "Unmarshalled record");
        Ok((index, values))
    }

    /// Pick the record a raw record belongs to: the first whose identifier
    /// fields all match, otherwise an unidentified record at or after the
    /// current position.
    fn identify(
        &mut self,
        stream: &CompiledStream,
        element: Option<&(Option<String>, String)>,
        target: String,
    ) -> Result<usize> {
        let format = stream.format();
        let candidates: Vec<usize> = stream
            .records()
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                element.is_none_or(|(namespace, name)| {
                    element_matches(record, namespace.as_deref(), name)
                })
            })
            .map(|(index, _)| index)
            .collect();

        for &index in &candidates {
            let record = &stream.records()[index];
            if record.is_identifiable() && self.matches_identifiers(format, record)? {
                trace!(record = %record.name(), "Identified record");
                return Ok(index);
            }
        }

        let start = self.occurrences.current_index().unwrap_or(0);
        let unidentified: Vec<usize> = candidates
            .into_iter()
            .filter(|&index| !stream.records()[index].is_identifiable())
            .collect();
        unidentified
            .iter()
            .copied()
            .find(|&index| !stream.is_ordered() || index >= start)
            .or_else(|| unidentified.first().copied())
            .ok_or_else(|| Error::UnmatchedRecord {
                stream: stream.name().to_string(),
                target,
            })
    }

    fn matches_identifiers(&mut self, format: Format, record: &CompiledRecord) -> Result<bool> {
        for field in record.identifiers() {
            let text = self.context.field_text(&field.layout())?;
            let matched = text
                .as_deref()
                .is_some_and(|text| field.rules().matches_identifier(unpad(format, field, text)));
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Extract one field. The outer result carries fatal context failures,
    /// the inner one a field error to collect.
    fn read_field(
        &mut self,
        format: Format,
        field: &CompiledField,
    ) -> Result<std::result::Result<Option<Value>, FieldError>> {
        let definition = field.definition();
        if !definition.is_repeating() {
            let text = self.context.field_text(&field.layout())?;
            if text.is_none() && definition.min_occurs > 0 && definition.default.is_none() {
                return Ok(Err(FieldError::rule(
                    &definition.name,
                    "min_occurs",
                    "Field is missing from the record",
                )));
            }
            return Ok(parse_text(field, text.as_deref().map(|t| unpad(format, field, t))));
        }

        let max = definition.max_occurs.unwrap_or(usize::MAX);
        let mut items = Vec::new();
        let mut failure = None;
        let mut occurrences = 0;
        self.context.iterations().push(definition.stride(format));
        while occurrences < max {
            self.context.iterations().set_index(occurrences);
            let text = match self.context.field_text(&field.layout()) {
                Ok(Some(text)) => text,
                Ok(None) => break,
                Err(e) => {
                    self.context.iterations().pop();
                    return Err(e.into());
                }
            };
            match parse_text(field, Some(unpad(format, field, &text))) {
                Ok(Some(value)) => items.push(value),
                Ok(None) => {}
                Err(error) => {
                    failure.get_or_insert(error);
                }
            }
            occurrences += 1;
        }
        self.context.iterations().pop();

        if let Some(error) = failure {
            return Ok(Err(error));
        }
        if occurrences < definition.min_occurs {
            return Ok(Err(FieldError::rule(
                &definition.name,
                "min_occurs",
                format!(
                    "Expected at least {} occurrences, found {occurrences}",
                    definition.min_occurs
                ),
            )));
        }
        Ok(Ok(Some(Value::List(items))))
    }
}

fn describe(raw: &RawRecord) -> String {
    match raw {
        RawRecord::Line(text) => format!("line '{text}'"),
        RawRecord::Tokens(tokens) => format!("tokens {tokens:?}"),
        RawRecord::Node(node) => format!("element '{}'", node.name),
    }
}

fn element_matches(record: &CompiledRecord, namespace: Option<&str>, name: &str) -> bool {
    match &record.definition().xml {
        Some(binding) => binding.matches(record.name(), namespace, name),
        None => record.name() == name,
    }
}

/// Strip fixed-length padding. A field made only of a digit pad keeps one
/// pad character so zero-filled numbers still read as zero.
fn unpad<'t>(format: Format, field: &CompiledField, text: &'t str) -> &'t str {
    let definition = field.definition();
    if format != Format::FixedLength || definition.length.is_none() {
        return text;
    }
    let padding = definition.padding;
    let stripped = match definition.justify {
        Justify::Left => text.trim_end_matches(padding),
        Justify::Right => text.trim_start_matches(padding),
    };
    if stripped.is_empty() && !text.is_empty() && padding.is_ascii_digit() {
        &text[text.len() - padding.len_utf8()..]
    } else {
        stripped
    }
}

/// Apply defaults, rules and the type handler to extracted text
fn parse_text(
    field: &CompiledField,
    text: Option<&str>,
) -> std::result::Result<Option<Value>, FieldError> {
    let definition = field.definition();
    let text = text
        .filter(|text| !text.is_empty())
        .or(definition.default.as_deref());
    field
        .rules()
        .check(text)
        .map_err(|violation| FieldError::rule(field.name(), violation.rule, violation.message))?;
    match text {
        Some(text) => field
            .handler()
            .parse(text)
            .map_err(|e| FieldError::conversion(field.name(), &e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_schema::{FieldDefinition, RecordDefinition, StreamDefinition};
    use recmap_types::TypeHandlerRegistry;

    fn unmarshaller(definition: &StreamDefinition) -> Unmarshaller {
        let stream = CompiledStream::compile(definition, &TypeHandlerRegistry::with_defaults())
            .unwrap();
        Unmarshaller::new(Arc::new(stream)).unwrap()
    }

    fn fixed_stream() -> StreamDefinition {
        StreamDefinition::new("s", Format::FixedLength)
            .record(
                RecordDefinition::new("header")
                    .field(FieldDefinition::new("type").length(1).literal("H").identifier())
                    .field(FieldDefinition::new("name").at(1).length(6)),
            )
            .record(
                RecordDefinition::new("detail")
                    .occurs(0, None)
                    .field(FieldDefinition::new("type").length(1).literal("D").identifier())
                    .field(
                        FieldDefinition::new("qty")
                            .at(1)
                            .length(4)
                            .type_name("int")
                            .padded('0', Justify::Right),
                    )
                    .field(
                        FieldDefinition::new("codes")
                            .at(5)
                            .length(2)
                            .occurs(0, Some(3)),
                    ),
            )
    }

    #[test]
    fn test_identifies_and_unpads() {
        let mut unmarshaller = unmarshaller(&fixed_stream());
        let header = unmarshaller.unmarshal(RawRecord::line("HACME  ")).unwrap();
        assert_eq!(header.bean_type(), "header");
        assert_eq!(header.get("name"), Some(&Value::from("ACME")));
        assert_eq!(unmarshaller.field_text("name"), Some("ACME  "));

        let detail = unmarshaller.unmarshal(RawRecord::line("D0042AABBCC")).unwrap();
        assert_eq!(unmarshaller.record_name(), Some("detail"));
        assert_eq!(detail.get("qty"), Some(&Value::Integer(42)));
        assert_eq!(
            detail.get("codes"),
            Some(&Value::List(vec![
                Value::from("AA"),
                Value::from("BB"),
                Value::from("CC")
            ]))
        );
    }

    #[test]
    fn test_zero_filled_number_reads_as_zero() {
        let mut unmarshaller = unmarshaller(&fixed_stream());
        unmarshaller.unmarshal(RawRecord::line("HACME  ")).unwrap();
        let detail = unmarshaller.unmarshal(RawRecord::line("D0000")).unwrap();
        assert_eq!(detail.get("qty"), Some(&Value::Integer(0)));
        assert_eq!(detail.get("codes"), Some(&Value::List(Vec::new())));
    }

    #[test]
    fn test_unmatched_record() {
        let mut unmarshaller = unmarshaller(&fixed_stream());
        let err = unmarshaller.unmarshal(RawRecord::line("X123")).unwrap_err();
        assert!(matches!(err, Error::UnmatchedRecord { ref target, .. } if target == "line 'X123'"));
        assert_eq!(unmarshaller.record_name(), None);
    }

    #[test]
    fn test_field_errors_collected() {
        let mut unmarshaller = unmarshaller(&fixed_stream());
        unmarshaller.unmarshal(RawRecord::line("HACME  ")).unwrap();
        let err = unmarshaller.unmarshal(RawRecord::line("D00x1")).unwrap_err();
        assert_eq!(err.field_errors().len(), 1);
        assert_eq!(err.field_errors()[0].field, "qty");
        assert_eq!(unmarshaller.record_name(), Some("detail"));
        assert_eq!(unmarshaller.occurrences().count(1), 0);
    }

    #[test]
    fn test_missing_field_is_a_field_error() {
        let mut unmarshaller = unmarshaller(&fixed_stream());
        let err = unmarshaller.unmarshal(RawRecord::line("H")).unwrap_err();
        match err {
            Error::InvalidRecord { record, errors } => {
                assert_eq!(record, "header");
                assert_eq!(errors[0].rule, Some("min_occurs"));
            }
            other => panic!("expected an invalid record, got {other:?}"),
        }
    }

    #[test]
    fn test_unmarshal_into_leaves_bean_on_failure() {
        let mut unmarshaller = unmarshaller(&fixed_stream());
        let mut bean = MapBean::new("custom").with("name", "kept");
        assert!(unmarshaller.unmarshal_into(RawRecord::line("H"), &mut bean).is_err());
        assert_eq!(bean.get("name"), Some(&Value::from("kept")));

        unmarshaller.unmarshal_into(RawRecord::line("HBOLT  "), &mut bean).unwrap();
        assert_eq!(bean.get("name"), Some(&Value::from("BOLT")));
        assert_eq!(bean.bean_type(), "custom");
    }

    #[test]
    fn test_unpad_helper() {
        let stream = CompiledStream::compile(&fixed_stream(), &TypeHandlerRegistry::with_defaults())
            .unwrap();
        let qty = &stream.records()[1].fields()[1];
        assert_eq!(unpad(Format::FixedLength, qty, "0042"), "42");
        assert_eq!(unpad(Format::FixedLength, qty, "0000"), "0");
        assert_eq!(unpad(Format::Csv, qty, "0042"), "0042");
        let name = &stream.records()[0].fields()[1];
        assert_eq!(unpad(Format::FixedLength, name, "AB  "), "AB");
        assert_eq!(unpad(Format::FixedLength, name, "    "), "");
    }
}
