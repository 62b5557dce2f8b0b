//! Error types for the report generation pipeline.
//!
//! One error type per pipeline stage:
//!
//! - [`ConfigError`] - mapping file loading and validation
//! - [`CsvError`] - tabular input reading
//! - [`TransformError`] - a value rejected by a field transform
//! - [`MapError`] - mapping one row into its record element
//! - [`BuildError`] - document assembly and serialization
//! - [`ValidationError`] - XSD validation of the generated document
//! - [`GeneratorError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::LeiError;
use crate::validation::SchemaIssue;

// =============================================================================
// Mapping Configuration Errors
// =============================================================================

/// Errors while loading a mapping file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the mapping file.
    #[error("Failed to read mapping file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The mapping file is not well-formed JSON, or has the wrong shape.
    #[error("Invalid mapping JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The mapping document does not match the mapping schema.
    #[error("Mapping does not match the mapping schema: {}", errors.join("; "))]
    Schema { errors: Vec<String> },

    /// No namespace declared.
    #[error("'namespaces' must declare at least one prefix")]
    EmptyNamespaces,

    /// The same prefix declared twice.
    #[error("Duplicate namespace prefix '{0}'")]
    DuplicatePrefix(String),

    /// Prefix is not a valid XML name.
    #[error("Invalid namespace prefix '{0}'")]
    InvalidPrefix(String),

    /// A qualified name references a prefix missing from `namespaces`.
    #[error("{location} uses undeclared namespace prefix '{prefix}'")]
    UndeclaredPrefix { location: String, prefix: String },

    /// Not a valid qualified name.
    #[error("Invalid qualified name '{name}' in {location}")]
    InvalidName { location: String, name: String },

    /// Transform identifier outside the recognized set.
    #[error("Field rule #{rule}: unknown transform '{name}'")]
    UnknownTransform { rule: usize, name: String },

    /// Structurally wrong field rule.
    #[error("Field rule #{rule}: {message}")]
    InvalidRule { rule: usize, message: String },

    /// Any other invalid value.
    #[error("Invalid value for '{location}': {message}")]
    InvalidValue { location: String, message: String },
}

// =============================================================================
// CSV Reading Errors
// =============================================================================

/// Errors while reading the tabular input.
///
/// Row numbers count data rows from 1 (the header is not a row).
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read the input file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input has no header line.
    #[error("Input has no header line")]
    NoHeaders,

    /// A column name appears twice in the header.
    #[error("Duplicate column '{0}' in header")]
    DuplicateHeader(String),

    /// Unusable delimiter.
    #[error("Invalid delimiter {0:?}: must be a single ASCII character")]
    InvalidDelimiter(char),

    /// Malformed CSV content.
    #[error("Row {row}: {message}")]
    Parse { row: usize, message: String },

    /// A row with a different field count than the header.
    #[error("Row {row}: expected {expected} fields, found {found}")]
    RowShape {
        row: usize,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// A value that does not satisfy a transform's input contract.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{transform} cannot convert '{value}': {message}")]
pub struct TransformError {
    pub transform: String,
    pub value: String,
    pub message: String,
}

impl TransformError {
    pub fn new(
        transform: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            transform: transform.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

/// Errors while mapping one row into its record element.
#[derive(Debug, Error)]
pub enum MapError {
    /// A mapped column is absent from the row.
    #[error("Row {row}: missing mapped column '{column}'")]
    MissingField { column: String, row: usize },

    /// A transform rejected the value.
    #[error("Row {row}, column '{column}': {source}")]
    Transform {
        row: usize,
        column: String,
        #[source]
        source: TransformError,
    },

    /// A value flagged as an identifier failed its check.
    #[error("Row {row}, column '{column}': invalid LEI '{value}': {source}")]
    InvalidIdentifier {
        row: usize,
        column: String,
        value: String,
        #[source]
        source: LeiError,
    },

    /// A `const` value references the environment and could not be resolved.
    #[error("Row {row}, column '{column}': {source}")]
    Macro {
        row: usize,
        column: String,
        #[source]
        source: BuildError,
    },

    /// The value holds a character XML 1.0 does not allow.
    #[error("Row {row}, column '{column}': character {character:?} is not allowed in XML")]
    InvalidCharacter {
        row: usize,
        column: String,
        character: char,
    },
}

// =============================================================================
// Build Errors
// =============================================================================

/// Errors while assembling or serializing the document.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A qualified name uses a prefix that is not declared on the root.
    #[error("Element or attribute '{name}' uses undeclared namespace prefix '{prefix}'")]
    Namespace { prefix: String, name: String },

    /// A referenced environment variable is not set.
    #[error("Environment variable '{0}' is not set")]
    MissingEnvironment(String),

    /// An identifier failed its format or checksum check.
    #[error("'{name}' is not a valid LEI ('{value}'): {source}")]
    InvalidIdentifier {
        name: String,
        value: String,
        #[source]
        source: LeiError,
    },

    /// A text or attribute value holds a character XML 1.0 does not allow.
    #[error("Value of '{name}' contains character {character:?}, not allowed in XML")]
    InvalidCharacter { name: String, character: char },

    /// Writing XML failed.
    #[error("Failed to serialize document: {0}")]
    Serialize(String),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors during schema validation of the generated document.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Schema directory does not exist.
    #[error("Schema directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// Explicit entry schema does not exist.
    #[error("Main XSD not found: {}", .0.display())]
    MissingSchema(PathBuf),

    /// No entry schema could be chosen in the directory.
    #[error("Cannot choose a main XSD in {}: pass one explicitly", .0.display())]
    NoMainSchema(PathBuf),

    /// The schema itself could not be loaded.
    #[error("Failed to load schema {}: {}", path.display(), errors.join("; "))]
    SchemaLoad { path: PathBuf, errors: Vec<String> },

    /// The document is not well-formed XML.
    #[error("Document is not well-formed: {0}")]
    Malformed(SchemaIssue),

    /// The document does not conform to the schema.
    #[error(
        "Document does not conform to the schema ({} error(s)):\n{}",
        issues.len(),
        issues.iter().map(|i| format!("  - {i}")).collect::<Vec<_>>().join("\n")
    )]
    Invalid { issues: Vec<SchemaIssue> },

    /// Built without XSD support.
    #[error("XSD validation is not available: rebuild with the 'xsd' feature")]
    Unsupported,

    /// Failed to read a file involved in validation.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Generator Errors (top-level)
// =============================================================================

/// Top-level report generation errors.
///
/// This is the error type returned by [`crate::generator::ReportGenerator`].
/// It wraps all lower-level errors and adds orchestration-specific variants.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Mapping configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input reading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Row mapping error.
    #[error("Mapping error: {0}")]
    Map(#[from] MapError),

    /// Document build error.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Schema validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No records while at least one is required.
    #[error("Input contains no records (pass --allow-empty to emit an empty report)")]
    EmptyInput,

    /// Failed to write the report.
    #[error("Failed to write '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for CSV reading.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for row mapping.
pub type MapResult<T> = Result<T, MapError>;

/// Result type for document building.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type for report generation.
pub type GeneratorResult<T> = Result<T, GeneratorError>;
