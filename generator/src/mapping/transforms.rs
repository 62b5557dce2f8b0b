//! Field transforms
//!
//! The fixed set of named conversions a field rule may apply to a raw CSV
//! value before it is written into the report.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TransformError;

/// All available transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Pass the value through unchanged
    Identity,

    /// Convert to uppercase
    Upper,

    /// Convert to lowercase
    Lower,

    /// Remove leading and trailing whitespace
    Trim,

    /// Parse a date in one of the accepted formats and emit `YYYY-MM-DD`
    DateIso,

    /// Normalize numeric text to plain fixed-point notation
    Decimal,

    /// Ignore the row value and emit the rule's `value`, macros resolved
    Const,
}

/// Date-only input formats accepted by [`Transform::DateIso`].
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d"];

/// Timestamp formats without offset; the date part is kept.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

impl Transform {
    pub const ALL: [Transform; 7] = [
        Transform::Identity,
        Transform::Upper,
        Transform::Lower,
        Transform::Trim,
        Transform::DateIso,
        Transform::Decimal,
        Transform::Const,
    ];

    /// Identifier used in mapping files.
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::Upper => "upper",
            Transform::Lower => "lower",
            Transform::Trim => "trim",
            Transform::DateIso => "date_iso",
            Transform::Decimal => "decimal",
            Transform::Const => "const",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Transform::Identity => "Pass the value through unchanged",
            Transform::Upper => "Convert to uppercase",
            Transform::Lower => "Convert to lowercase",
            Transform::Trim => "Remove leading/trailing whitespace",
            Transform::DateIso => "Normalize a date with a four-digit year to YYYY-MM-DD",
            Transform::Decimal => "Normalize a number to plain fixed point",
            Transform::Const => "Emit the rule's value, macros resolved",
        }
    }

    /// Apply this transform to a value.
    ///
    /// `constant` is the rule's literal, used by [`Transform::Const`] only.
    pub fn apply(&self, value: &str, constant: Option<&str>) -> Result<String, TransformError> {
        match self {
            Transform::Identity => Ok(value.to_string()),
            Transform::Upper => Ok(value.to_uppercase()),
            Transform::Lower => Ok(value.to_lowercase()),
            Transform::Trim => Ok(value.trim().to_string()),
            Transform::DateIso => apply_date_iso(value),
            Transform::Decimal => apply_decimal(value),
            Transform::Const => constant
                .map(str::to_string)
                .ok_or_else(|| TransformError::new(self.name(), value, "rule has no 'value'")),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transform::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Apply a chain of transforms in order.
pub fn apply_chain(
    transforms: &[Transform],
    value: &str,
    constant: Option<&str>,
) -> Result<String, TransformError> {
    transforms
        .iter()
        .try_fold(value.to_string(), |acc, t| t.apply(&acc, constant))
}

fn apply_date_iso(value: &str) -> Result<String, TransformError> {
    parse_date(value.trim())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| TransformError::new("date_iso", value, "unrecognized date format"))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    // %Y accepts any number of digits; reports need a four-digit year
    parse_any_date(s).filter(|date| date.year() >= 1000)
}

fn parse_any_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    // Compact YYYYMMDD
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s[0..4].parse().ok()?;
        let month = s[4..6].parse().ok()?;
        let day = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn apply_decimal(value: &str) -> Result<String, TransformError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransformError::new("decimal", value, "empty value"));
    }
    let cleaned = strip_grouping(trimmed)
        .ok_or_else(|| TransformError::new("decimal", value, "misplaced digit group separator"))?;
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map(|d| d.normalize().to_string())
        .map_err(|e| TransformError::new("decimal", value, e.to_string()))
}

fn is_group_separator(c: char) -> bool {
    matches!(c, ',' | '_' | ' ' | '\u{a0}')
}

/// Remove thousands separators from the integer part.
///
/// Every separator must be followed by exactly three digits, so a decimal
/// comma (`1,5`) is rejected instead of being read as `15`.
fn strip_grouping(value: &str) -> Option<String> {
    if !value.contains(is_group_separator) {
        return Some(value.to_string());
    }
    let split = value.find(['.', 'e', 'E']).unwrap_or(value.len());
    let (integer, rest) = value.split_at(split);
    if rest.contains(is_group_separator) {
        return None;
    }

    let digits = integer.strip_prefix(['+', '-']).unwrap_or(integer);
    let is_digits = |group: &str| !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit());
    let mut groups = digits.split(is_group_separator);
    let first = groups.next()?;
    if !is_digits(first) || first.len() > 3 {
        return None;
    }
    if !groups.all(|group| group.len() == 3 && is_digits(group)) {
        return None;
    }

    let mut cleaned: String = integer.chars().filter(|&c| !is_group_separator(c)).collect();
    cleaned.push_str(rest);
    Some(cleaned)
}

/// Get a description of all transforms
pub fn transforms_description() -> String {
    let mut out = String::from(
        "Available field transforms:\n\n| Transform | Description |\n|-----------|-------------|\n",
    );
    for t in Transform::ALL {
        out.push_str(&format!("| {} | {} |\n", t.name(), t.description()));
    }
    out.push_str(
        r#"
Example field rules in JSON:
[
  {"from": "isin", "to": "rep:New/rep:FinInstrm/rep:Id", "transform": ["trim", "upper"]},
  {"from": "trade_date", "to": "rep:New/rep:Tx/rep:TradDt", "transform": "date_iso"},
  {"from": "price", "to": "rep:New/rep:Tx/rep:Pric/rep:Pric/rep:MntryVal/rep:Amt", "transform": "decimal"},
  {"from": "currency", "to": "rep:New/rep:Tx/rep:Pric/rep:Pric/rep:MntryVal/rep:Amt@Ccy", "transform": "upper"},
  {"to": "rep:New/rep:InvstmtPtyInd", "transform": "const", "value": "true"}
]"#,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_string_transforms() {
        assert_eq!(Transform::Identity.apply(" a B ", None).unwrap(), " a B ");
        assert_eq!(Transform::Upper.apply("xoff", None).unwrap(), "XOFF");
        assert_eq!(Transform::Lower.apply("EUR", None).unwrap(), "eur");
        assert_eq!(Transform::Trim.apply("  hello  ", None).unwrap(), "hello");
    }

    #[rstest]
    #[case("2024-01-05")]
    #[case("05/01/2024")]
    #[case("2024-01-05T10:00:00Z")]
    #[case("2024-01-05T10:00:00+02:00")]
    #[case("20240105")]
    #[case("05.01.2024")]
    #[case("2024/01/05")]
    #[case("2024-01-05 10:00:00")]
    #[case("2024-01-05T10:00:00.250")]
    #[case(" 2024-01-05 ")]
    fn test_date_iso_accepted(#[case] input: &str) {
        assert_eq!(Transform::DateIso.apply(input, None).unwrap(), "2024-01-05");
    }

    #[rstest]
    #[case("not-a-date")]
    #[case("2024-13-01")]
    #[case("31/02/2024")]
    #[case("05/01/24")]
    #[case("24-01-05")]
    #[case("")]
    fn test_date_iso_rejected(#[case] input: &str) {
        let err = Transform::DateIso.apply(input, None).unwrap_err();
        assert_eq!(err.transform, "date_iso");
        assert_eq!(err.value, input);
    }

    #[rstest]
    #[case("1,234.50", "1234.5")]
    #[case("100.00", "100")]
    #[case(" 42 ", "42")]
    #[case("-0.500", "-0.5")]
    #[case("1 000 000", "1000000")]
    #[case("1e3", "1000")]
    #[case("0.0001", "0.0001")]
    #[case("12_345.5", "12345.5")]
    #[case("-1,234,567", "-1234567")]
    #[case("1,234e2", "123400")]
    fn test_decimal(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Transform::Decimal.apply(input, None).unwrap(), expected);
    }

    #[rstest]
    #[case("abc")]
    #[case("1.2.3")]
    #[case("")]
    #[case("1,5")]
    #[case("1.234,56")]
    #[case("12,34")]
    #[case("1,2345")]
    #[case(",123")]
    #[case("1234,567")]
    fn test_decimal_rejected(#[case] input: &str) {
        let err = Transform::Decimal.apply(input, None).unwrap_err();
        assert_eq!(err.transform, "decimal");
        assert_eq!(err.value, input);
    }

    #[test]
    fn test_const() {
        assert_eq!(Transform::Const.apply("ignored", Some("NORE")).unwrap(), "NORE");
        assert!(Transform::Const.apply("ignored", None).is_err());
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = [Transform::Trim, Transform::Upper];
        assert_eq!(apply_chain(&chain, "  xs123 ", None).unwrap(), "XS123");
        assert_eq!(apply_chain(&[], "as-is", None).unwrap(), "as-is");
    }

    #[test]
    fn test_from_str_covers_all() {
        for t in Transform::ALL {
            assert_eq!(t.name().parse::<Transform>().unwrap(), t);
        }
        assert_eq!("uppercase".parse::<Transform>().unwrap_err(), "uppercase");
    }

    #[test]
    fn test_description_lists_all() {
        let text = transforms_description();
        for t in Transform::ALL {
            assert!(text.contains(t.name()));
        }
    }
}
