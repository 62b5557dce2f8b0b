//! Validation: JSON Schema for mapping files, XSD for generated reports.
//!
//! # Mapping files
//!
//! The mapping schema is embedded at compile time from
//! `schemas/mapping.schema.json` and checked with JSON Schema Draft 7 before
//! a mapping is resolved.
//!
//! # Reports
//!
//! A report is always checked for well-formedness first. XSD validation
//! goes through a [`SchemaValidator`]; [`XsdValidator`] uses libxml2 when
//! the crate is built with the `xsd` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use mifid_txgen::validation::{SchemaValidator, XsdValidator};
//!
//! let report = XsdValidator.validate(&xml, Path::new("xsd"), None)?;
//! report.into_result()?;
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;

mod xsd;

pub use xsd::{check_well_formed, XsdValidator};

// =============================================================================
// JSON Schema
// =============================================================================

static MAPPING_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/mapping.schema.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every error otherwise
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use mifid_txgen::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["name"],
///     "properties": {
///         "name": { "type": "string" }
///     }
/// });
///
/// assert!(validate(&schema, &json!({ "name": "test" })).is_ok());
/// assert!(validate(&schema, &json!({ "age": 42 })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Just true/false.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a parsed mapping document against the mapping schema.
pub fn validate_mapping_document(data: &Value) -> Result<(), Vec<String>> {
    validate(&MAPPING_SCHEMA, data)
}

/// Quick check against the mapping schema.
pub fn is_valid_mapping_document(data: &Value) -> bool {
    is_valid(&MAPPING_SCHEMA, data)
}

// =============================================================================
// XML Schema
// =============================================================================

/// One validation finding, with its position in the document when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(line: Option<usize>, column: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "line {line}, column {column}: {}", self.message),
            (Some(line), None) => write!(f, "line {line}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<SchemaIssue>,
    /// Entry schema actually used.
    pub schema: PathBuf,
}

impl ValidationReport {
    pub fn from_issues(schema: PathBuf, errors: Vec<SchemaIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            schema,
        }
    }

    /// `Ok` when valid, otherwise every issue as [`ValidationError::Invalid`].
    pub fn into_result(self) -> Result<Self, ValidationError> {
        if self.valid {
            Ok(self)
        } else {
            Err(ValidationError::Invalid {
                issues: self.errors,
            })
        }
    }
}

/// Validates serialized documents against an XML schema set.
pub trait SchemaValidator {
    /// Validate `document` against the schemas in `xsd_dir`, entering at
    /// `main_xsd` or at the schema chosen by [`resolve_main_schema`].
    fn validate(
        &self,
        document: &str,
        xsd_dir: &Path,
        main_xsd: Option<&Path>,
    ) -> Result<ValidationReport, ValidationError>;

    /// Validate a file on disk.
    fn validate_file(
        &self,
        path: &Path,
        xsd_dir: &Path,
        main_xsd: Option<&Path>,
    ) -> Result<ValidationReport, ValidationError> {
        let document = fs::read_to_string(path).map_err(|source| ValidationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.validate(&document, xsd_dir, main_xsd)
    }
}

/// Name fragments of preferred entry schemas, most specific first.
const MAIN_SCHEMA_HINTS: &[&str] = &["head.003", "auth.016"];

/// Choose the entry schema.
///
/// An explicit path must exist, as given or relative to `xsd_dir`.
/// Otherwise the `.xsd` file whose name contains `head.003` is used, then
/// `auth.016`, then the only `.xsd` file of the directory.
pub fn resolve_main_schema(xsd_dir: &Path, explicit: Option<&Path>) -> Result<PathBuf, ValidationError> {
    if !xsd_dir.is_dir() {
        return Err(ValidationError::MissingDirectory(xsd_dir.to_path_buf()));
    }
    if let Some(path) = explicit {
        return [path.to_path_buf(), xsd_dir.join(path)]
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| ValidationError::MissingSchema(path.to_path_buf()));
    }

    let entries = fs::read_dir(xsd_dir).map_err(|source| ValidationError::Io {
        path: xsd_dir.to_path_buf(),
        source,
    })?;
    let mut schemas: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xsd")))
        .collect();
    schemas.sort();

    let file_name = |p: &PathBuf| p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    for hint in MAIN_SCHEMA_HINTS {
        if let Some(found) = schemas.iter().find(|p| file_name(p).contains(hint)) {
            return Ok(found.clone());
        }
    }
    match schemas.as_slice() {
        [only] => Ok(only.clone()),
        _ => Err(ValidationError::NoMainSchema(xsd_dir.to_path_buf())),
    }
}
