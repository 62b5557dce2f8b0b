//! Domain models for the report generation pipeline.
//!
//! - [`Row`] - one input row as read (column name → value)
//! - [`TradeRecord`] - the domain view of one transaction row
//! - [`Lei`] - a checked Legal Entity Identifier (ISO 17442)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One input row: column name → raw value.
pub type Row = HashMap<String, String>;

// =============================================================================
// Trade Record
// =============================================================================

/// One transaction as read from the input.
///
/// Values are kept exactly as read; transforms never modify the record.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    row: usize,
    fields: Row,
}

impl TradeRecord {
    /// Wrap a row read at the given (1-based) data row index.
    pub fn new(row: usize, fields: Row) -> Self {
        Self { row, fields }
    }

    /// Data row index this record was read from.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Raw value of a column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// All fields of the record.
    pub fn fields(&self) -> &Row {
        &self.fields
    }
}

// =============================================================================
// Legal Entity Identifier
// =============================================================================

/// Why a string is not a valid LEI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeiError {
    #[error("expected 20 characters, found {0}")]
    Length(usize),

    #[error("only uppercase letters and digits are allowed")]
    Charset,

    #[error("the last two characters must be check digits")]
    CheckDigits,

    #[error("checksum mismatch")]
    Checksum,
}

/// A Legal Entity Identifier.
///
/// 18 uppercase alphanumeric characters followed by two check digits,
/// validated with ISO 7064 MOD 97-10 (the value read as a number, letters
/// expanded to 10..=35, must leave remainder 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Lei(String);

impl Lei {
    pub const LEN: usize = 20;

    /// Parse and check an LEI.
    pub fn parse(value: &str) -> Result<Self, LeiError> {
        let len = value.chars().count();
        if len != Self::LEN {
            return Err(LeiError::Length(len));
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
        {
            return Err(LeiError::Charset);
        }
        if !value.as_bytes()[18..].iter().all(u8::is_ascii_digit) {
            return Err(LeiError::CheckDigits);
        }
        if mod97(value) != 1 {
            return Err(LeiError::Checksum);
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn mod97(value: &str) -> u32 {
    value.bytes().fold(0u32, |rem, b| {
        if b.is_ascii_digit() {
            (rem * 10 + u32::from(b - b'0')) % 97
        } else {
            (rem * 100 + u32::from(b - b'A' + 10)) % 97
        }
    })
}

impl FromStr for Lei {
    type Err = LeiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Lei {
    type Error = LeiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Lei> for String {
    fn from(lei: Lei) -> Self {
        lei.0
    }
}

impl fmt::Display for Lei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("5493001KJTIIGC8Y1R12")]
    #[case("529900T8BM49AURSDO55")]
    #[case("213800ABCDEFGH123446")]
    fn test_valid_lei(#[case] value: &str) {
        let lei = Lei::parse(value).unwrap();
        assert_eq!(lei.as_str(), value);
        assert_eq!(lei.to_string(), value);
    }

    #[rstest]
    #[case::too_short("INVALID", LeiError::Length(7))]
    #[case::lowercase("5493001kjtiigc8y1r12", LeiError::Charset)]
    #[case::punctuation("5493001KJTIIGC8Y1R-2", LeiError::Charset)]
    #[case::letter_check_digits("5493001KJTIIGC8Y1RAB", LeiError::CheckDigits)]
    #[case::bad_checksum("5493001KJTIIGC8Y1R13", LeiError::Checksum)]
    fn test_invalid_lei(#[case] value: &str, #[case] expected: LeiError) {
        assert_eq!(Lei::parse(value).unwrap_err(), expected);
    }

    #[test]
    fn test_lei_serde() {
        let lei: Lei = serde_json::from_str("\"5493001KJTIIGC8Y1R12\"").unwrap();
        assert_eq!(lei.as_str(), "5493001KJTIIGC8Y1R12");
        assert!(serde_json::from_str::<Lei>("\"INVALID\"").is_err());
    }

    #[test]
    fn test_trade_record_accessors() {
        let mut fields = Row::new();
        fields.insert("isin".to_string(), "XS1234567890".to_string());
        let record = TradeRecord::new(4, fields);

        assert_eq!(record.row(), 4);
        assert_eq!(record.get("isin"), Some("XS1234567890"));
        assert_eq!(record.get("missing"), None);
        assert_eq!(record.fields().len(), 1);
    }
}
