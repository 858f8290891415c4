#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # recmap-format
//!
//! Field addressing and format contexts for fixed-length, delimited and XML
//! records.
//!
//! An [`UnmarshallingContext`] holds one record at a time and resolves field
//! descriptors (name, position, length, until) to field text. A
//! [`MarshallingContext`] assembles one record field by field inside a
//! [`RecordScope`] and hands back a [`MarshalledRecord`], which produces the
//! text, array, list or document shape on request.
//!
//! ## Example Usage
//!
//! ```rust
//! use recmap_format::{FieldLayout, Format, FormatConfig, RawRecord, UnmarshallingContext};
//!
//! let mut context = UnmarshallingContext::new(&FormatConfig::new(Format::FixedLength)).unwrap();
//! context.set_record_value(RawRecord::line("ABC123  ")).unwrap();
//!
//! let code = FieldLayout::new("code").at(3).length(3);
//! assert_eq!(context.field_text(&code).unwrap().as_deref(), Some("123"));
//! assert_eq!(context.cached_field_text("code"), Some("123"));
//! ```

pub mod config;
pub mod context;
pub mod delimited;
pub mod encoding;
pub mod fixed;
pub mod node;
pub mod record;
pub mod xml;

pub use config::FormatConfig;
pub use context::{
    FieldLayout, IterationStack, Justify, MarshallingContext, RawRecord, RecordLayout,
    RecordScope, UnmarshallingContext,
};
pub use encoding::Encoding;
pub use node::{XmlAttribute, XmlBinding, XmlDocument, XmlKind, XmlNode};
pub use record::{MarshalledRecord, Shape};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record formats supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Fields occupy fixed byte ranges, no delimiters
    #[serde(alias = "fixed-length", alias = "fixed")]
    FixedLength,
    /// Fields separated by a delimiter, no quoting
    Delimited,
    /// Delimited with quote handling
    Csv,
    /// One element subtree per record
    Xml,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::FixedLength => write!(f, "fixedlength"),
            Format::Delimited => write!(f, "delimited"),
            Format::Csv => write!(f, "csv"),
            Format::Xml => write!(f, "xml"),
        }
    }
}

/// Errors raised while addressing, slicing or assembling records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Text could not be converted to or from the configured encoding
    #[error("Encoding error ({encoding}): {message}")]
    Encoding { encoding: Encoding, message: String },

    /// A field was read or written outside the begin/end window of a record
    #[error("No record is open: {0}")]
    RecordNotSet(String),

    /// A field could not be placed into or located in the record
    #[error("Cannot address field '{field}': {message}")]
    Addressing { field: String, message: String },

    /// The requested output shape is not supported by the record's format
    #[error("Cannot produce {requested} output from a {format} record")]
    ShapeMismatch { requested: Shape, format: Format },

    /// A raw record of the wrong kind was supplied
    #[error("Unsupported raw record for {format} format: expected {expected}")]
    UnsupportedRecord {
        format: Format,
        expected: &'static str,
    },

    /// Raw line text could not be split into tokens
    #[error("Record tokenize error: {0}")]
    Tokenize(String),

    /// Invalid context configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an encoding error
    pub fn encoding(encoding: Encoding, message: impl Into<String>) -> Self {
        Self::Encoding {
            encoding,
            message: message.into(),
        }
    }

    /// Create an addressing error
    pub fn addressing(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Addressing {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
