#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # recmap-schema
//!
//! The immutable descriptor tree a stream is compiled from: a
//! [`StreamDefinition`] holds ordered [`RecordDefinition`]s, each holding
//! [`FieldDefinition`]s with their addressing, occurrence bounds, type
//! handler configuration, validation [`FieldRules`] and XML binding.
//!
//! Descriptors derive `serde::Deserialize`, so an external mapping loader can
//! produce them from JSON or YAML; [`StreamDefinition::validate`] rejects
//! inconsistent trees before anything is compiled.
//!
//! ## Example Usage
//!
//! ```rust
//! use recmap_format::Format;
//! use recmap_schema::{FieldDefinition, RecordDefinition, StreamDefinition};
//!
//! let stream = StreamDefinition::new("orders", Format::FixedLength)
//!     .record(
//!         RecordDefinition::new("header")
//!             .occurs(1, Some(1))
//!             .field(FieldDefinition::new("type").at(0).length(1).literal("H").identifier())
//!             .field(FieldDefinition::new("date").at(1).length(8).type_name("date").pattern("%Y%m%d")),
//!     );
//! stream.validate().unwrap();
//! assert_eq!(stream.records[0].layout_length(Format::FixedLength).unwrap(), 9);
//! ```

pub mod model;
pub mod rules;

pub use model::{FieldDefinition, RecordDefinition, StreamDefinition};
pub use rules::{CompiledRules, FieldRules, RuleViolation};

use thiserror::Error;

/// Errors raised while checking or compiling a descriptor tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The descriptor tree is inconsistent
    #[error("Invalid definition at {path}: {message}")]
    InvalidDefinition { path: String, message: String },

    /// A field rule could not be compiled
    #[error("Invalid rule '{rule}' on field '{field}': {message}")]
    InvalidRule {
        field: String,
        rule: &'static str,
        message: String,
    },
}

impl Error {
    /// Create an invalid definition error
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
