//! Finished records and the output shapes they can be viewed in

use crate::node::XmlDocument;
use crate::{Error, Format, Result};
use serde::{Deserialize, Serialize};

/// Output shape requested from a marshalled record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Text,
    Array,
    List,
    Document,
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Text => write!(f, "text"),
            Shape::Array => write!(f, "array"),
            Shape::List => write!(f, "list"),
            Shape::Document => write!(f, "document"),
        }
    }
}

/// A frozen record produced by a marshalling context.
///
/// Shapes are produced on request and never consume the record, so every
/// accessor can be called any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalledRecord {
    /// Fixed-length record text and its field texts in position order
    FixedLength { text: String, fields: Vec<String> },
    /// Delimited or CSV line and its tokens
    Delimited {
        format: Format,
        text: String,
        tokens: Vec<String>,
    },
    /// XML record element wrapped in a document
    Xml(XmlDocument),
}

impl MarshalledRecord {
    /// Format the record was produced for
    pub fn format(&self) -> Format {
        match self {
            Self::FixedLength { .. } => Format::FixedLength,
            Self::Delimited { format, .. } => *format,
            Self::Xml(_) => Format::Xml,
        }
    }

    /// Record text. Every format supports this shape.
    pub fn to_text(&self) -> String {
        match self {
            Self::FixedLength { text, .. } | Self::Delimited { text, .. } => text.clone(),
            Self::Xml(document) => document.to_xml_string(),
        }
    }

    /// Field texts as a list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] for XML records.
    pub fn to_list(&self) -> Result<Vec<String>> {
        match self {
            Self::FixedLength { fields, .. } => Ok(fields.clone()),
            Self::Delimited { tokens, .. } => Ok(tokens.clone()),
            Self::Xml(_) => Err(self.mismatch(Shape::List)),
        }
    }

    /// Field texts as a fixed-size array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] for XML records.
    pub fn to_array(&self) -> Result<Box<[String]>> {
        match self {
            Self::Xml(_) => Err(self.mismatch(Shape::Array)),
            _ => Ok(self.to_list()?.into_boxed_slice()),
        }
    }

    /// XML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] for fixed-length and delimited records.
    pub fn to_document(&self) -> Result<XmlDocument> {
        match self {
            Self::Xml(document) => Ok(document.clone()),
            _ => Err(self.mismatch(Shape::Document)),
        }
    }

    fn mismatch(&self, requested: Shape) -> Error {
        Error::ShapeMismatch {
            requested,
            format: self.format(),
        }
    }
}

impl std::fmt::Display for MarshalledRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedLength { text, .. } | Self::Delimited { text, .. } => f.write_str(text),
            Self::Xml(document) => write!(f, "{document}"),
        }
    }
}
