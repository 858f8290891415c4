//! XML records.
//!
//! Each record is one element. Fields are attributes, child elements or the
//! element's own text, matched by local name and namespace. Position, length
//! and `until` play no part; inside a repetition the index selects the nth
//! matching child.

use crate::context::{FieldCache, FieldLayout, IterationStack, RawRecord, RecordLayout};
use crate::node::{XmlAttribute, XmlBinding, XmlDocument, XmlKind, XmlNode};
use crate::record::MarshalledRecord;
use crate::{Error, Format, Result};
use tracing::{debug, trace};

static DEFAULT_BINDING: XmlBinding = XmlBinding {
    kind: XmlKind::Element,
    name: None,
    namespace: None,
    prefix: None,
};

/// Unmarshalling side of an XML stream
#[derive(Debug, Default)]
pub struct XmlUnmarshallingContext {
    node: Option<XmlNode>,
    cache: FieldCache,
    iterations: IterationStack,
}

impl XmlUnmarshallingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a record element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRecord`] for lines and tokens.
    pub fn set_record_value(&mut self, raw: RawRecord) -> Result<()> {
        let RawRecord::Node(node) = raw else {
            return Err(Error::UnsupportedRecord {
                format: Format::Xml,
                expected: "node",
            });
        };
        trace!(element = node.name.as_str(), "XML record set");
        self.node = Some(node);
        self.cache.clear();
        self.iterations.clear();
        Ok(())
    }

    /// Text bound to a field, or `None` when the record lacks it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotSet`] outside a record.
    pub fn field_text(&mut self, name: &str, binding: Option<&XmlBinding>) -> Result<Option<String>> {
        let node = self
            .node
            .as_ref()
            .ok_or_else(|| Error::RecordNotSet(name.to_string()))?;
        let binding = binding.unwrap_or(&DEFAULT_BINDING);

        let text = match binding.kind {
            XmlKind::Attribute => node.attribute(binding, name).map(str::to_string),
            XmlKind::Element => node
                .nth_child(binding, name, self.iterations.current_index())
                .map(|child| child.text.clone().unwrap_or_default()),
            XmlKind::Text => node.text.clone(),
        };

        if let Some(text) = &text {
            self.cache.insert(name, text);
        }
        Ok(text)
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
        self.node = None;
        self.cache.clear();
        self.iterations.clear();
    }
}

/// Marshalling side of an XML stream
#[derive(Debug, Default)]
pub struct XmlMarshallingContext {
    node: Option<XmlNode>,
    iterations: IterationStack,
}

impl XmlMarshallingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_record(&mut self, layout: &RecordLayout<'_>) {
        let binding = layout.xml.unwrap_or(&DEFAULT_BINDING);
        let mut node = XmlNode::new(binding.local_name(layout.name));
        if let Some(namespace) = &binding.namespace {
            node = node.in_namespace(namespace.as_str(), binding.prefix.as_deref());
        }
        self.node = Some(node);
        self.iterations.clear();
    }

    pub(crate) fn set_field_text(&mut self, field: &FieldLayout<'_>, text: &str) -> Result<()> {
        let node = self
            .node
            .as_mut()
            .ok_or_else(|| Error::RecordNotSet(field.name.to_string()))?;
        let binding = field.xml.unwrap_or(&DEFAULT_BINDING);
        let local_name = binding.local_name(field.name);

        match binding.kind {
            XmlKind::Attribute => {
                node.set_attribute(XmlAttribute {
                    name: local_name.to_string(),
                    namespace: binding.namespace.clone(),
                    prefix: binding.namespace.as_ref().and(binding.prefix.clone()),
                    value: text.to_string(),
                });
            }
            XmlKind::Element => {
                let mut child = XmlNode::new(local_name).with_text(text);
                if let Some(namespace) = &binding.namespace {
                    child = child.in_namespace(namespace.as_str(), binding.prefix.as_deref());
                }
                node.add_child(child);
            }
            XmlKind::Text => node.text = Some(text.to_string()),
        }
        trace!(field = field.name, kind = ?binding.kind, "Wrote XML field");
        Ok(())
    }

    pub(crate) fn iterations(&mut self) -> &mut IterationStack {
        &mut self.iterations
    }

    pub(crate) fn end_record(&mut self) -> Result<MarshalledRecord> {
        let node = self
            .node
            .take()
            .ok_or_else(|| Error::RecordNotSet("end of record".to_string()))?;
        self.iterations.clear();
        debug!(element = node.name.as_str(), "Finished XML record");
        Ok(MarshalledRecord::Xml(XmlDocument::new(node)))
    }

    pub(crate) fn discard(&mut self) {
        self.node = None;
        self.iterations.clear();
    }
}
