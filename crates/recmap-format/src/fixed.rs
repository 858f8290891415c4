//! Fixed-length records.
//!
//! Positions, lengths and `until` offsets are counted in encoded bytes of the
//! configured encoding, so a record in ISO-8859-1 and the same record in
//! UTF-8 can address the same text at different offsets.

use crate::config::FormatConfig;
use crate::context::{FieldCache, FieldLayout, IterationStack, Justify, RawRecord, RecordLayout};
use crate::encoding::Encoding;
use crate::record::MarshalledRecord;
use crate::{Error, Format, Result};
use tracing::{debug, trace};

/// Unmarshalling side of a fixed-length stream
#[derive(Debug)]
pub struct FixedLengthUnmarshallingContext {
    encoding: Encoding,
    record: Option<Vec<u8>>,
    record_length: usize,
    cache: FieldCache,
    iterations: IterationStack,
}

impl FixedLengthUnmarshallingContext {
    /// Create a context reading records in the given encoding
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            record: None,
            record_length: 0,
            cache: FieldCache::default(),
            iterations: IterationStack::default(),
        }
    }

    /// Install a record line. Its encoded length is fixed for the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRecord`] for anything but a line and
    /// [`Error::Encoding`] when the line is not representable.
    pub fn set_record_value(&mut self, raw: RawRecord) -> Result<()> {
        let RawRecord::Line(text) = raw else {
            return Err(Error::UnsupportedRecord {
                format: Format::FixedLength,
                expected: "line",
            });
        };
        let bytes = self.encoding.encode(&text)?;
        self.record_length = bytes.len();
        self.record = Some(bytes);
        self.cache.clear();
        self.iterations.clear();
        trace!(record_length = self.record_length, "Fixed-length record set");
        Ok(())
    }

    /// Length of the current record in encoded bytes
    pub fn record_length(&self) -> usize {
        self.record_length
    }

    /// Slice and decode a field, or `None` when the record is too short.
    ///
    /// `until` only excludes fields at non-negative positions. A field with
    /// a length is sliced whole or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotSet`] outside a record and
    /// [`Error::Encoding`] when the slice splits a character.
    pub fn field_text(
        &mut self,
        name: &str,
        position: i32,
        length: Option<usize>,
        until: i32,
    ) -> Result<Option<String>> {
        let record = self
            .record
            .as_deref()
            .ok_or_else(|| Error::RecordNotSet(name.to_string()))?;

        let record_length = to_i64(self.record_length);
        let start = if position < 0 {
            self.iterations.adjust(record_length + i64::from(position))
        } else {
            let max = record_length + i64::from(until);
            let start = self.iterations.adjust(i64::from(position));
            if start >= max {
                trace!(field = name, start, max, "Field excluded by until");
                return Ok(None);
            }
            start
        };
        if start < 0 || start > record_length {
            trace!(field = name, start, record_length, "Field outside record");
            return Ok(None);
        }

        let end = match length {
            Some(length) => start.saturating_add(to_i64(length)),
            None if position < 0 => record_length,
            None => (record_length + i64::from(until)).min(record_length),
        };
        if end > record_length {
            trace!(field = name, start, end, record_length, "Field runs past record end");
            return Ok(None);
        }
        // 0 <= start <= end <= record_length here
        let slice = &record[start as usize..end as usize];
        let text = self.encoding.decode(slice).map_err(|e| match e {
            Error::Encoding { encoding, message } => Error::encoding(
                encoding,
                format!("field '{name}' at byte {start}: {message}"),
            ),
            other => other,
        })?;

        self.cache.insert(name, &text);
        Ok(Some(text))
    }

    /// Text already resolved for a field in the current record
    pub fn cached_field_text(&self, name: &str) -> Option<&str> {
        self.cache.get(name)
    }

    /// Mutable access to the repetition stack
    pub fn iterations(&mut self) -> &mut IterationStack {
        &mut self.iterations
    }

    /// End the current record
    pub fn clear(&mut self) {
        self.record = None;
        self.record_length = 0;
        self.cache.clear();
        self.iterations.clear();
    }
}

/// Marshalling side of a fixed-length stream
#[derive(Debug)]
pub struct FixedLengthMarshallingContext {
    default_encoding: Encoding,
    filler_char: char,
    /// Encoding of the record being written
    encoding: Encoding,
    filler: Vec<u8>,
    buffer: Option<Vec<u8>>,
    layout_length: usize,
    fields: Vec<(usize, String)>,
    iterations: IterationStack,
}

impl FixedLengthMarshallingContext {
    /// Create a context writing records in the configured encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the filler is not representable.
    pub fn new(config: &FormatConfig) -> Result<Self> {
        let filler = config
            .encoding
            .encode(config.filler.encode_utf8(&mut [0; 4]))
            .map_err(|e| Error::config(format!("filler '{}': {e}", config.filler)))?;
        Ok(Self {
            default_encoding: config.encoding,
            filler_char: config.filler,
            encoding: config.encoding,
            filler,
            buffer: None,
            layout_length: 0,
            fields: Vec::new(),
            iterations: IterationStack::default(),
        })
    }

    pub(crate) fn begin_record(&mut self, layout: &RecordLayout<'_>) {
        let encoding = layout.encoding.unwrap_or(self.default_encoding);
        if encoding != self.encoding {
            // an unrepresentable filler surfaces when a gap needs filling
            self.filler = encoding
                .encode(self.filler_char.encode_utf8(&mut [0; 4]))
                .unwrap_or_default();
            self.encoding = encoding;
            debug!(%encoding, "Fixed-length record encoding changed");
        }
        self.buffer = Some(Vec::with_capacity(layout.length));
        self.layout_length = layout.length;
        self.fields.clear();
        self.iterations.clear();
    }

    pub(crate) fn set_field_text(&mut self, field: &FieldLayout<'_>, text: &str) -> Result<()> {
        if self.buffer.is_none() {
            return Err(Error::RecordNotSet(field.name.to_string()));
        }

        let start = if field.position < 0 {
            self.iterations
                .adjust(to_i64(self.layout_length) + i64::from(field.position))
        } else {
            self.iterations.adjust(i64::from(field.position))
        };
        let start = usize::try_from(start).map_err(|_| {
            Error::addressing(
                field.name,
                format!(
                    "position {} resolves before the start of a {}-byte layout",
                    field.position, self.layout_length
                ),
            )
        })?;

        let bytes = self.fit(field, text)?;
        let field_text = self.encoding.decode(&bytes)?;

        let filler = gap_filler(&self.filler, self.filler_char, self.encoding)?;
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| Error::RecordNotSet(field.name.to_string()))?;
        if buffer.len() < start {
            let gap = start - buffer.len();
            buffer.extend(filler.iter().cycle().take(gap));
        }
        let end = start + bytes.len();
        if buffer.len() < end {
            buffer.resize(end, 0);
        }
        buffer[start..end].copy_from_slice(&bytes);

        trace!(field = field.name, start, end, "Wrote fixed-length field");
        self.fields.push((start, field_text));
        Ok(())
    }

    /// Encode field text padded or truncated to the field length
    fn fit(&self, field: &FieldLayout<'_>, text: &str) -> Result<Vec<u8>> {
        let Some(length) = field.length else {
            return self.encoding.encode(text);
        };

        let mut bytes = self.encoding.encode(text)?;
        if bytes.len() > length {
            let kept = self.truncate(text, length, field.justify)?;
            debug!(
                field = field.name,
                length,
                original = text,
                kept = kept.as_str(),
                "Truncated fixed-length field"
            );
            bytes = self.encoding.encode(&kept)?;
        }

        let missing = length - bytes.len();
        if missing == 0 {
            return Ok(bytes);
        }
        let pad = self.encoding.encode(field.padding.encode_utf8(&mut [0; 4]))?;
        if pad.is_empty() || missing % pad.len() != 0 {
            return Err(Error::addressing(
                field.name,
                format!(
                    "padding '{}' cannot fill {missing} bytes in {}",
                    field.padding, self.encoding
                ),
            ));
        }
        let padding = pad.repeat(missing / pad.len());
        Ok(match field.justify {
            Justify::Left => [bytes, padding].concat(),
            Justify::Right => [padding, bytes].concat(),
        })
    }

    /// Longest run of whole characters fitting in `length` bytes, taken from
    /// the head for left justification and from the tail for right
    fn truncate(&self, text: &str, length: usize, justify: Justify) -> Result<String> {
        let mut used = 0;
        let mut kept = Vec::new();
        let chars: Box<dyn Iterator<Item = char>> = match justify {
            Justify::Left => Box::new(text.chars()),
            Justify::Right => Box::new(text.chars().rev()),
        };
        for c in chars {
            let width = self.encoding.encoded_len(c.encode_utf8(&mut [0; 4]))?;
            if used + width > length {
                break;
            }
            used += width;
            kept.push(c);
        }
        if justify == Justify::Right {
            kept.reverse();
        }
        Ok(kept.into_iter().collect())
    }

    pub(crate) fn iterations(&mut self) -> &mut IterationStack {
        &mut self.iterations
    }

    pub(crate) fn end_record(&mut self) -> Result<MarshalledRecord> {
        let mut buffer = self
            .buffer
            .take()
            .ok_or_else(|| Error::RecordNotSet("end of record".to_string()))?;
        if buffer.len() < self.layout_length {
            let gap = self.layout_length - buffer.len();
            let filler = gap_filler(&self.filler, self.filler_char, self.encoding)?;
            buffer.extend(filler.iter().cycle().take(gap));
        }
        let text = self.encoding.decode(&buffer)?;

        let mut fields = std::mem::take(&mut self.fields);
        fields.sort_by_key(|(start, _)| *start);
        self.iterations.clear();

        debug!(bytes = buffer.len(), fields = fields.len(), "Finished fixed-length record");
        Ok(MarshalledRecord::FixedLength {
            text,
            fields: fields.into_iter().map(|(_, text)| text).collect(),
        })
    }

    pub(crate) fn discard(&mut self) {
        self.buffer = None;
        self.fields.clear();
        self.iterations.clear();
    }
}

fn gap_filler(filler: &[u8], filler_char: char, encoding: Encoding) -> Result<&[u8]> {
    if filler.is_empty() {
        return Err(Error::encoding(
            encoding,
            format!("filler '{filler_char}' is not representable"),
        ));
    }
    Ok(filler)
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(line: &str) -> FixedLengthUnmarshallingContext {
        let mut context = FixedLengthUnmarshallingContext::new(Encoding::Utf8);
        context.set_record_value(RawRecord::line(line)).unwrap();
        context
    }

    #[test]
    fn test_positive_positions() {
        let mut context = reader("ABC123  ");
        assert_eq!(context.record_length(), 8);
        assert_eq!(context.field_text("a", 0, Some(3), 0).unwrap().as_deref(), Some("ABC"));
        assert_eq!(context.field_text("b", 3, Some(3), 0).unwrap().as_deref(), Some("123"));
        assert_eq!(context.field_text("c", 6, None, 0).unwrap().as_deref(), Some("  "));
        assert_eq!(context.field_text("d", 8, Some(1), 0).unwrap(), None);
    }

    #[test]
    fn test_negative_positions_and_until() {
        let mut context = reader("HDR0042X");
        assert_eq!(context.field_text("t", -1, Some(1), 0).unwrap().as_deref(), Some("X"));
        assert_eq!(context.field_text("n", 3, None, -1).unwrap().as_deref(), Some("0042"));
        assert_eq!(context.field_text("m", 3, Some(10), -1).unwrap(), None);
        assert_eq!(context.field_text("far", -9, Some(1), 0).unwrap(), None);
        assert_eq!(context.field_text("cut", 7, Some(1), -1).unwrap(), None);
    }

    #[test]
    fn test_until_does_not_shorten_fields() {
        let mut context = reader("ABCDEFGHIJKLMNOPQRST");
        assert_eq!(context.field_text("a", 12, Some(4), -5).unwrap().as_deref(), Some("MNOP"));
        assert_eq!(context.field_text("b", 14, Some(4), -5).unwrap().as_deref(), Some("OPQR"));
        assert_eq!(context.field_text("c", 15, Some(4), -5).unwrap(), None);

        let mut context = reader("ABCDEFGH");
        assert_eq!(context.field_text("d", -2, Some(2), -1).unwrap().as_deref(), Some("GH"));
        assert_eq!(context.field_text("e", -1, None, -4).unwrap().as_deref(), Some("H"));
        assert_eq!(context.field_text("f", 6, Some(3), 0).unwrap(), None);
    }

    #[test]
    fn test_repetition_adjusts_position() {
        let mut context = reader("AAABBBCC");
        context.iterations().push(3);
        context.iterations().set_index(1);
        assert_eq!(context.field_text("v", 0, Some(3), 0).unwrap().as_deref(), Some("BBB"));
        context.iterations().set_index(2);
        assert_eq!(context.field_text("v", 0, Some(3), 0).unwrap(), None);
        assert_eq!(context.field_text("v", 0, Some(2), 0).unwrap().as_deref(), Some("CC"));
        context.iterations().set_index(3);
        assert_eq!(context.field_text("v", 0, Some(3), 0).unwrap(), None);
    }

    #[test]
    fn test_byte_positions_follow_encoding() {
        let mut latin = FixedLengthUnmarshallingContext::new(Encoding::Latin1);
        latin.set_record_value(RawRecord::line("éAB")).unwrap();
        assert_eq!(latin.field_text("f", 1, Some(2), 0).unwrap().as_deref(), Some("AB"));

        let mut utf8 = reader("éAB");
        assert_eq!(utf8.record_length(), 4);
        assert_eq!(utf8.field_text("f", 2, Some(2), 0).unwrap().as_deref(), Some("AB"));
        assert!(matches!(
            utf8.field_text("split", 1, Some(2), 0),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn test_record_not_set() {
        let mut context = FixedLengthUnmarshallingContext::new(Encoding::Utf8);
        assert!(matches!(
            context.field_text("a", 0, Some(1), 0),
            Err(Error::RecordNotSet(_))
        ));
        context.set_record_value(RawRecord::line("x")).unwrap();
        context.clear();
        assert!(context.field_text("a", 0, Some(1), 0).is_err());
        assert!(
            context
                .set_record_value(RawRecord::tokens(["a"]))
                .is_err()
        );
    }

    fn writer() -> FixedLengthMarshallingContext {
        FixedLengthMarshallingContext::new(&FormatConfig::new(Format::FixedLength)).unwrap()
    }

    #[test]
    fn test_marshal_pads_and_fills_gaps() {
        let mut context = writer();
        context.begin_record(&RecordLayout::new("r").length(10));
        context
            .set_field_text(&FieldLayout::new("code").at(0).length(4), "AB")
            .unwrap();
        context
            .set_field_text(
                &FieldLayout::new("qty").at(6).length(3).padded('0', Justify::Right),
                "7",
            )
            .unwrap();
        let record = context.end_record().unwrap();
        assert_eq!(record.to_text(), "AB    007 ");
        assert_eq!(record.to_list().unwrap(), vec!["AB  ", "007"]);
    }

    #[test]
    fn test_marshal_truncates_at_char_boundary() {
        let mut context = writer();
        context.begin_record(&RecordLayout::new("r"));
        context
            .set_field_text(&FieldLayout::new("a").at(0).length(3), "héllo")
            .unwrap();
        context
            .set_field_text(
                &FieldLayout::new("b").at(3).length(3).padded(' ', Justify::Right),
                "12345",
            )
            .unwrap();
        let record = context.end_record().unwrap();
        assert_eq!(record.to_text(), "hé345");
        assert_eq!(record.to_list().unwrap(), vec!["hé", "345"]);

        context.begin_record(&RecordLayout::new("r"));
        context
            .set_field_text(&FieldLayout::new("a").at(0).length(2), "hé")
            .unwrap();
        assert_eq!(context.end_record().unwrap().to_text(), "h ");
    }

    #[test]
    fn test_record_encoding_override() {
        let mut context = writer();
        let field = FieldLayout::new("a").at(2).length(2);

        context.begin_record(&RecordLayout::new("r").encoding(Encoding::Latin1));
        context.set_field_text(&field, "hé").unwrap();
        assert_eq!(context.end_record().unwrap().to_text(), "  hé");

        context.begin_record(&RecordLayout::new("r"));
        context.set_field_text(&field, "hé").unwrap();
        assert_eq!(context.end_record().unwrap().to_text(), "  h ");

        context.begin_record(&RecordLayout::new("r").encoding(Encoding::Ascii));
        assert!(matches!(
            context.set_field_text(&field, "hé"),
            Err(Error::Encoding { encoding: Encoding::Ascii, .. })
        ));
    }

    #[test]
    fn test_marshal_negative_position() {
        let mut context = writer();
        context.begin_record(&RecordLayout::new("r").length(6));
        context
            .set_field_text(&FieldLayout::new("head").at(0).length(3), "ABC")
            .unwrap();
        context
            .set_field_text(&FieldLayout::new("tail").at(-2).length(2), "XY")
            .unwrap();
        assert_eq!(context.end_record().unwrap().to_text(), "ABC XY");

        context.begin_record(&RecordLayout::new("r").length(1));
        let err = context
            .set_field_text(&FieldLayout::new("tail").at(-2).length(2), "XY")
            .unwrap_err();
        assert!(matches!(err, Error::Addressing { .. }));
    }

    #[test]
    fn test_marshal_unrepresentable_text() {
        let config = FormatConfig::new(Format::FixedLength).encoding(Encoding::Ascii);
        let mut context = FixedLengthMarshallingContext::new(&config).unwrap();
        context.begin_record(&RecordLayout::new("r"));
        assert!(matches!(
            context.set_field_text(&FieldLayout::new("a").length(3), "né"),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn test_unrepresentable_filler_rejected() {
        let config = FormatConfig::new(Format::FixedLength)
            .encoding(Encoding::Ascii)
            .filler('·');
        assert!(matches!(
            FixedLengthMarshallingContext::new(&config),
            Err(Error::Config(_))
        ));
    }
}
