//! Well-formedness check and libxml2-backed XSD validation.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

use super::{resolve_main_schema, SchemaIssue, SchemaValidator, ValidationReport};
use crate::error::ValidationError;
use crate::xml::is_xml_char;

/// Check that `document` is well-formed XML with exactly one root element.
pub fn check_well_formed(document: &str) -> Result<(), ValidationError> {
    if let Some((offset, c)) = document.char_indices().find(|&(_, c)| !is_xml_char(c)) {
        return Err(malformed(document, offset, format!("character {c:?} is not allowed in XML")));
    }

    let mut reader = Reader::from_str(document);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Empty(_)) if depth == 0 => roots += 1,
            Ok(Event::Text(text)) if depth == 0 && text.iter().any(|b| !b.is_ascii_whitespace()) => {
                return Err(malformed(document, position, "text outside the root element"));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(malformed(document, reader.error_position() as usize, e.to_string()));
            }
        }
        if roots > 1 {
            return Err(malformed(document, position, "more than one root element"));
        }
    }

    if roots == 0 {
        return Err(ValidationError::Malformed(SchemaIssue::new(None, None, "no root element")));
    }
    if depth > 0 {
        return Err(malformed(document, document.len(), "unexpected end of document: unclosed element"));
    }
    Ok(())
}

/// Issue at a byte offset, as 1-based line and column.
fn malformed(document: &str, offset: usize, message: impl Into<String>) -> ValidationError {
    let offset = offset.min(document.len());
    let before = &document.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = offset - before.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1) + 1;
    ValidationError::Malformed(SchemaIssue::new(Some(line), Some(column), message))
}

/// XSD validation through libxml2.
///
/// Without the `xsd` feature every call past the well-formedness check
/// fails with [`ValidationError::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct XsdValidator;

impl XsdValidator {
    /// Whether this build can validate against XSD.
    pub const fn available() -> bool {
        cfg!(feature = "xsd")
    }
}

impl SchemaValidator for XsdValidator {
    fn validate(
        &self,
        document: &str,
        xsd_dir: &Path,
        main_xsd: Option<&Path>,
    ) -> Result<ValidationReport, ValidationError> {
        let schema = resolve_main_schema(xsd_dir, main_xsd)?;
        check_well_formed(document)?;
        let issues = libxml2::validate(document, &schema)?;
        Ok(ValidationReport::from_issues(schema, issues))
    }
}

#[cfg(feature = "xsd")]
mod libxml2 {
    use libxml::error::StructuredError;
    use libxml::parser::Parser;
    use libxml::schemas::{SchemaParserContext, SchemaValidationContext};
    use std::path::Path;

    use super::SchemaIssue;
    use crate::error::ValidationError;

    pub(super) fn validate(document: &str, schema: &Path) -> Result<Vec<SchemaIssue>, ValidationError> {
        let schema_path = schema.to_string_lossy();
        let mut parser = SchemaParserContext::from_file(&schema_path);
        let mut context = SchemaValidationContext::from_parser(&mut parser).map_err(|errors| {
            ValidationError::SchemaLoad {
                path: schema.to_path_buf(),
                errors: errors.iter().map(|e| issue(e).to_string()).collect(),
            }
        })?;

        let doc = Parser::default()
            .parse_string(document)
            .map_err(|e| ValidationError::Malformed(SchemaIssue::new(None, None, format!("{e:?}"))))?;

        match context.validate_document(&doc) {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(issue).collect()),
        }
    }

    fn issue(error: &StructuredError) -> SchemaIssue {
        SchemaIssue::new(
            error.line.map(|l| l as usize),
            error.col.map(|c| c as usize),
            error
                .message
                .as_deref()
                .unwrap_or("unknown error")
                .trim(),
        )
    }
}

#[cfg(not(feature = "xsd"))]
mod libxml2 {
    use std::path::Path;

    use super::SchemaIssue;
    use crate::error::ValidationError;

    pub(super) fn validate(_document: &str, _schema: &Path) -> Result<Vec<SchemaIssue>, ValidationError> {
        Err(ValidationError::Unsupported)
    }
}
