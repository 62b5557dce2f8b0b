//! # mifid-txgen - CSV to MiFID transaction report XML
//!
//! Turns tabular trade records into an ESMA MiFID transaction report
//! (ISO 20022 `auth.016`), driven by a declarative JSON mapping.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Mapper    │────▶│ XML Builder │──▶ report.xml
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (rules+fx)  │     │ (+envelope) │    (XSD check)
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mifid_txgen::{GeneratorOptions, ReportGenerator, RunContext};
//! use std::path::Path;
//!
//! let mut generator = ReportGenerator::from_path("config/mapping.json", GeneratorOptions::default())?;
//! generator.generate(Path::new("trades.csv"), Path::new("report.xml"), &RunContext::from_process())?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per pipeline stage
//! - [`models`] - Trade records and LEIs
//! - [`parser`] - CSV reading with auto-detection
//! - [`mapping`] - Mapping configuration, transforms, macros, field mapper
//! - [`xml`] - XML tree, document builder and serializer
//! - [`validation`] - Mapping schema and XSD validation
//! - [`generator`] - End-to-end orchestration
//! - [`context`] - Environment, clock and message id of a run
//! - [`logs`] - Pipeline logging

// Core modules
pub mod context;
pub mod error;
pub mod logs;
pub mod models;

// Parsing
pub mod parser;

// Mapping
pub mod mapping;

// XML
pub mod xml;

// Validation
pub mod validation;

// Orchestration
pub mod generator;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BuildError, ConfigError, CsvError, GeneratorError, MapError, TransformError, ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use context::RunContext;
pub use models::{Lei, LeiError, Row, TradeRecord};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{decode_content, detect_delimiter, detect_encoding, Rows, TabularReader};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapping::{transforms_description, FieldMapper, FieldRule, MappingConfig, Transform};

// =============================================================================
// Re-exports - XML
// =============================================================================

pub use xml::{build, Document, DocumentBuilder, QName, XmlNode};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    check_well_formed, is_valid, resolve_main_schema, validate, SchemaIssue, SchemaValidator,
    ValidationReport, XsdValidator,
};

// =============================================================================
// Re-exports - Generator
// =============================================================================

pub use generator::{
    EmptyInputPolicy, GenerationReport, GeneratorOptions, Rendered, ReportGenerator, Stage,
    ValidationRequest,
};
