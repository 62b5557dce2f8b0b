//! Tabular reader with encoding and delimiter auto-detection.
//!
//! Yields one [`Row`] (header → value) per data line. Header names and
//! values are trimmed, blank lines skipped. Data rows are numbered from 1.

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{CsvError, CsvResult};
use crate::models::{Row, TradeRecord};

/// Candidate delimiters, in tie-break order.
const DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Detect the encoding of raw bytes.
///
/// Valid UTF-8 wins; otherwise chardet decides.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "iso-8859-15" | "latin-9" | "latin9" => "iso-8859-15".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes using the given encoding, dropping any byte order mark.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        // Latin-1 labels decode as windows-1252, as browsers do
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0
        }
        "iso-8859-15" | "latin-9" | "latin9" => encoding_rs::ISO_8859_15.decode(bytes).0,
        // UTF-8, ASCII and anything unknown
        _ => String::from_utf8_lossy(bytes),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded.into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the header line.
///
/// Ties go to the earlier candidate; a header without any resolves to `,`.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;
    for sep in DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

// =============================================================================
// Reader
// =============================================================================

/// Decoded tabular input.
///
/// [`TabularReader::rows`] may be called any number of times; each call
/// restarts from the first data row.
#[derive(Debug, Clone)]
pub struct TabularReader {
    source: Option<PathBuf>,
    content: String,
    encoding: String,
    delimiter: u8,
    headers: Vec<String>,
}

impl TabularReader {
    /// Read a file, detecting encoding and delimiter.
    pub fn open(path: impl AsRef<Path>) -> CsvResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| CsvError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = Self::from_bytes(&bytes)?;
        reader.source = Some(path.to_path_buf());
        Ok(reader)
    }

    /// Read in-memory bytes, detecting encoding and delimiter.
    pub fn from_bytes(bytes: &[u8]) -> CsvResult<Self> {
        let encoding = detect_encoding(bytes);
        let content = decode_content(bytes, &encoding);
        let delimiter = detect_delimiter(&content);
        Self::build(content, encoding, delimiter)
    }

    /// Use `delimiter` instead of the detected one.
    pub fn with_delimiter(self, delimiter: char) -> CsvResult<Self> {
        let source = self.source;
        let mut reader = Self::build(self.content, self.encoding, delimiter)?;
        reader.source = source;
        Ok(reader)
    }

    fn build(content: String, encoding: String, delimiter: char) -> CsvResult<Self> {
        if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
            return Err(CsvError::InvalidDelimiter(delimiter));
        }
        let delimiter = delimiter as u8;
        let headers = read_headers(&content, delimiter)?;
        Ok(Self {
            source: None,
            content,
            encoding,
            delimiter,
            headers,
        })
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn delimiter(&self) -> char {
        self.delimiter as char
    }

    /// Data rows, in file order.
    pub fn rows(&self) -> Rows<'_> {
        let records = reader_builder(self.delimiter)
            .has_headers(true)
            .from_reader(self.content.as_bytes())
            .into_records();
        Rows {
            records,
            headers: &self.headers,
            row: 0,
        }
    }

    /// Data rows as trade records carrying their row index.
    pub fn records(&self) -> impl Iterator<Item = CsvResult<TradeRecord>> + '_ {
        self.rows()
            .enumerate()
            .map(|(i, row)| row.map(|fields| TradeRecord::new(i + 1, fields)))
    }
}

fn reader_builder(delimiter: u8) -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(delimiter).trim(Trim::All).flexible(true);
    builder
}

fn read_headers(content: &str, delimiter: u8) -> CsvResult<Vec<String>> {
    let mut reader = reader_builder(delimiter)
        .has_headers(true)
        .from_reader(content.as_bytes());
    let record = reader.headers().map_err(|e| CsvError::Parse {
        row: 0,
        message: e.to_string(),
    })?;
    if record.is_empty() || record.iter().all(str::is_empty) {
        return Err(CsvError::NoHeaders);
    }

    let mut seen = HashSet::new();
    let mut headers = Vec::with_capacity(record.len());
    for name in record.iter() {
        if !seen.insert(name) {
            return Err(CsvError::DuplicateHeader(name.to_string()));
        }
        headers.push(name.to_string());
    }
    Ok(headers)
}

/// Iterator over the data rows of a [`TabularReader`].
pub struct Rows<'a> {
    records: StringRecordsIntoIter<&'a [u8]>,
    headers: &'a [String],
    row: usize,
}

impl Rows<'_> {
    fn to_row(&self, record: &StringRecord) -> CsvResult<Row> {
        if record.len() != self.headers.len() {
            return Err(CsvError::RowShape {
                row: self.row,
                expected: self.headers.len(),
                found: record.len(),
            });
        }
        Ok(self
            .headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect())
    }
}

impl Iterator for Rows<'_> {
    type Item = CsvResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.records.next()?;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    return Some(Err(CsvError::Parse {
                        row: self.row + 1,
                        message: e.to_string(),
                    }))
                }
            };
            // A whitespace-only line reads as one empty field
            if record.len() == 1 && record[0].is_empty() && self.headers.len() > 1 {
                continue;
            }
            self.row += 1;
            return Some(self.to_row(&record));
        }
    }
}
