#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # recmap-stream
//!
//! Marshals beans to records and unmarshals records to beans according to a
//! compiled [`StreamDefinition`](recmap_schema::StreamDefinition).
//!
//! A [`StreamFactory`] compiles each definition once (resolving type
//! handlers and rule regexes) and shares it by name. Each [`Marshaller`] or
//! [`Unmarshaller`] owns its format context and its [`OccurrenceTracker`],
//! so one instance serves one stream at a time.
//!
//! ## Example Usage
//!
//! ```rust
//! use recmap_format::Format;
//! use recmap_schema::{FieldDefinition, RecordDefinition, StreamDefinition};
//! use recmap_stream::{MapBean, StreamFactory};
//! use recmap_format::RawRecord;
//!
//! let definition = StreamDefinition::new("items", Format::Csv).record(
//!     RecordDefinition::new("item")
//!         .occurs(0, None)
//!         .field(FieldDefinition::new("sku").at(0))
//!         .field(FieldDefinition::new("qty").at(1).type_name("int")),
//! );
//! let factory = StreamFactory::new();
//! factory.load(&definition).unwrap();
//!
//! let mut marshaller = factory.create_marshaller("items").unwrap();
//! marshaller
//!     .marshal(&MapBean::new("item").with("sku", "A-1").with("qty", 3_i64))
//!     .unwrap();
//! assert_eq!(marshaller.to_text().unwrap(), "A-1,3");
//!
//! let mut unmarshaller = factory.create_unmarshaller("items").unwrap();
//! let bean = unmarshaller.unmarshal(RawRecord::line("B-2,5")).unwrap();
//! assert_eq!(bean.get("qty").and_then(|v| v.as_integer()), Some(5));
//! ```

pub mod bean;
pub mod compiled;
pub mod factory;
pub mod marshaller;
pub mod occurrence;
pub mod unmarshaller;

pub use bean::{BeanAccessor, MapBean};
pub use compiled::{CompiledField, CompiledRecord, CompiledStream};
pub use factory::StreamFactory;
pub use marshaller::Marshaller;
pub use occurrence::{OccurrenceError, OccurrenceState, OccurrenceTracker, Transition};
pub use unmarshaller::Unmarshaller;

use thiserror::Error;

/// A conversion or validation failure attributable to one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    /// Violated rule, or `None` for type conversion failures
    pub rule: Option<&'static str>,
    pub message: String,
}

impl FieldError {
    pub(crate) fn conversion(field: &str, error: &recmap_types::Error) -> Self {
        Self {
            field: field.to_string(),
            rule: None,
            message: error.to_string(),
        }
    }

    pub(crate) fn rule(field: &str, rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            rule: Some(rule),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by marshallers, unmarshallers and the stream factory
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The definition tree is inconsistent
    #[error(transparent)]
    Definition(#[from] recmap_schema::Error),

    /// A field's type handler could not be configured
    #[error("Field '{field}': {source}")]
    Handler {
        field: String,
        #[source]
        source: recmap_types::Error,
    },

    /// Fatal context failure: encoding, addressing or record shape
    #[error(transparent)]
    Format(#[from] recmap_format::Error),

    /// The record may not occur at this point of the stream
    #[error(transparent)]
    Occurrence(#[from] OccurrenceError),

    /// No record of the stream matches the bean or the raw record
    #[error("No record in stream '{stream}' matches {target}")]
    UnmatchedRecord { stream: String, target: String },

    /// Field errors found while unmarshalling a record
    #[error("Invalid record '{record}': {}", join_field_errors(.errors))]
    InvalidRecord {
        record: String,
        errors: Vec<FieldError>,
    },

    /// Field errors found while marshalling a bean
    #[error("Invalid bean for record '{record}': {}", join_field_errors(.errors))]
    InvalidBean {
        record: String,
        errors: Vec<FieldError>,
    },

    /// Output was requested before any successful marshal
    #[error("No record has been marshalled")]
    NothingMarshalled,

    /// No stream of that name is loaded in the factory
    #[error("Stream not found: {0}")]
    StreamNotFound(String),
}

impl Error {
    /// Field errors carried by an invalid record or bean
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Error::InvalidRecord { errors, .. } | Error::InvalidBean { errors, .. } => errors,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
