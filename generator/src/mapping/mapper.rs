//! Field mapper: one row in, one record element out.

use super::config::{FieldRule, IdentifierCheck, MappingConfig};
use super::macros::resolve;
use super::transforms::apply_chain;
use crate::context::RunContext;
use crate::error::{MapError, MapResult};
use crate::models::{Lei, Row, TradeRecord};
use crate::xml::{invalid_xml_char, XmlNode};

/// Applies the field rules of a mapping to rows.
///
/// Stateless between rows; a failed row leaves nothing behind. `const`
/// values are macro-resolved against the run context.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapper<'a> {
    config: &'a MappingConfig,
    ctx: &'a RunContext,
}

impl<'a> FieldMapper<'a> {
    pub fn new(config: &'a MappingConfig, ctx: &'a RunContext) -> Self {
        Self { config, ctx }
    }

    /// Map the row at `row_index` into a record element.
    pub fn map(&self, row_index: usize, row: &Row) -> MapResult<XmlNode> {
        let mut record = XmlNode::new(self.config.record_element.clone());
        for rule in &self.config.fields {
            if let Some(value) = self.value_for(rule, row_index, row)? {
                self.write(&mut record, rule, value);
            }
        }
        Ok(record)
    }

    pub fn map_record(&self, record: &TradeRecord) -> MapResult<XmlNode> {
        self.map(record.row(), record.fields())
    }

    /// Final value of a rule, or `None` when an empty value is skipped.
    fn value_for(&self, rule: &FieldRule, row: usize, fields: &Row) -> MapResult<Option<String>> {
        let column = rule.label();
        let raw = match rule.from.as_deref() {
            Some(from) if !rule.is_const() => fields
                .get(from)
                .map(String::as_str)
                .ok_or_else(|| MapError::MissingField {
                    column: from.to_string(),
                    row,
                })?,
            _ => "",
        };
        if self.config.skip_empty && !rule.is_const() && raw.trim().is_empty() {
            return Ok(None);
        }

        let constant = match rule.value.as_deref() {
            Some(value) if rule.is_const() => {
                Some(resolve(value, self.ctx).map_err(|source| MapError::Macro {
                    row,
                    column: column.to_string(),
                    source,
                })?)
            }
            other => other.map(str::to_string),
        };
        let value = apply_chain(&rule.transforms, raw, constant.as_deref()).map_err(|source| {
            MapError::Transform {
                row,
                column: column.to_string(),
                source,
            }
        })?;
        if self.config.skip_empty && value.is_empty() {
            return Ok(None);
        }
        if let Some(character) = invalid_xml_char(&value) {
            return Err(MapError::InvalidCharacter {
                row,
                column: column.to_string(),
                character,
            });
        }

        if rule.check == Some(IdentifierCheck::Lei) {
            Lei::parse(&value).map_err(|source| MapError::InvalidIdentifier {
                row,
                column: column.to_string(),
                value: value.clone(),
                source,
            })?;
        }
        Ok(Some(value))
    }

    /// Last write wins for both text and attributes.
    fn write(&self, record: &mut XmlNode, rule: &FieldRule, value: String) {
        let target = record.ensure_path(&rule.target.elements, &self.config.child_order);
        match &rule.target.attribute {
            Some(attribute) => target.set_attribute(attribute.clone(), value),
            None => target.text = Some(value),
        }
    }
}
