//! Streams compiled once and shared by every marshaller and unmarshaller

use crate::occurrence::OccurrenceRule;
use crate::{Error, Result};
use recmap_format::{FieldLayout, Format, FormatConfig, RecordLayout};
use recmap_schema::{CompiledRules, FieldDefinition, RecordDefinition, StreamDefinition};
use recmap_types::{TypeHandler, TypeHandlerRegistry};
use std::sync::Arc;
use tracing::debug;

/// A field with its handler resolved and its rules compiled
#[derive(Debug, Clone)]
pub struct CompiledField {
    definition: FieldDefinition,
    handler: Arc<dyn TypeHandler>,
    rules: CompiledRules,
}

impl CompiledField {
    fn compile(definition: &FieldDefinition, registry: &TypeHandlerRegistry) -> Result<Self> {
        let handler = registry
            .resolve(&definition.type_name, &definition.handler)
            .map_err(|source| Error::Handler {
                field: definition.name.clone(),
                source,
            })?;
        if let Some(default) = &definition.default {
            handler.parse(default).map_err(|source| Error::Handler {
                field: definition.name.clone(),
                source,
            })?;
        }
        let rules = definition.rules.compile(&definition.name)?;
        Ok(Self {
            definition: definition.clone(),
            handler,
            rules,
        })
    }

    pub fn definition(&self) -> &FieldDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn handler(&self) -> &dyn TypeHandler {
        self.handler.as_ref()
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn layout(&self) -> FieldLayout<'_> {
        self.definition.layout()
    }
}

/// A record with its fields compiled
#[derive(Debug, Clone)]
pub struct CompiledRecord {
    definition: RecordDefinition,
    fields: Vec<CompiledField>,
    layout_length: usize,
}

impl CompiledRecord {
    fn compile(
        definition: &RecordDefinition,
        format: Format,
        registry: &TypeHandlerRegistry,
    ) -> Result<Self> {
        let fields = definition
            .fields
            .iter()
            .map(|field| CompiledField::compile(field, registry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            definition: definition.clone(),
            fields,
            layout_length: definition.layout_length(format)?,
        })
    }

    pub fn definition(&self) -> &RecordDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    /// Fields that identify the record
    pub fn identifiers(&self) -> impl Iterator<Item = &CompiledField> {
        self.fields.iter().filter(|f| f.definition.identifier)
    }

    pub fn is_identifiable(&self) -> bool {
        self.definition.is_identifiable()
    }

    /// Record layout for a marshalling context
    pub fn layout(&self) -> RecordLayout<'_> {
        RecordLayout {
            name: &self.definition.name,
            length: self.layout_length,
            xml: self.definition.xml.as_ref(),
            encoding: None,
        }
    }
}

/// An immutable, validated stream ready for marshalling and unmarshalling
#[derive(Debug, Clone)]
pub struct CompiledStream {
    name: String,
    format: Format,
    ordered: bool,
    config: FormatConfig,
    records: Vec<CompiledRecord>,
}

impl CompiledStream {
    /// Validate a definition and compile every record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Definition`] for an inconsistent tree and
    /// [`Error::Handler`] for unknown types or bad patterns.
    pub fn compile(definition: &StreamDefinition, registry: &TypeHandlerRegistry) -> Result<Self> {
        definition.validate()?;
        let records = definition
            .records
            .iter()
            .map(|record| CompiledRecord::compile(record, definition.format, registry))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            stream = %definition.name,
            format = %definition.format,
            record_count = records.len(),
            "Compiled stream"
        );
        Ok(Self {
            name: definition.name.clone(),
            format: definition.format,
            ordered: definition.ordered,
            config: definition.format_config(),
            records,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn format_config(&self) -> &FormatConfig {
        &self.config
    }

    pub fn records(&self) -> &[CompiledRecord] {
        &self.records
    }

    /// Index of a record by name
    pub fn record_index(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.name() == name)
    }

    /// Occurrence rules in declaration order
    pub fn occurrence_rules(&self) -> Vec<OccurrenceRule> {
        self.records.iter().map(|r| OccurrenceRule::from(&r.definition)).collect()
    }
}
