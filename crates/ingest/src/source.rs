//! Uploaded bytes → header row + raw records.

use serde::Serialize;

use crate::error::IngestError;
use crate::model::RawRow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A decoded CSV file.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub delimiter: u8,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Decode as UTF-8 (BOM stripped), falling back to Windows-1252.
pub fn decode(bytes: &[u8]) -> Result<String, IngestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            // Excel exports on Windows are usually cp1252
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    };

    if text.trim().is_empty() {
        return Err(IngestError::EmptyFile);
    }
    Ok(text)
}

/// Delimiters tried when none is configured, in tie-break order.
const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Data rows inspected after the header row.
const SAMPLE_ROWS: usize = 20;

/// How well one delimiter splits the start of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DelimiterGuess {
    pub delimiter: char,
    /// Cells in the header row.
    pub columns: usize,
    /// Sampled data rows with exactly `columns` cells.
    pub matching_rows: usize,
    pub sampled_rows: usize,
}

impl DelimiterGuess {
    pub fn byte(&self) -> u8 {
        self.delimiter as u8
    }

    fn rank(&self) -> (usize, usize) {
        (self.matching_rows, self.columns)
    }
}

/// Pick the delimiter whose header split is confirmed by the most data rows.
///
/// A candidate must split the header into at least two cells. More matching
/// rows wins, then more columns, then candidate order. Blank rows are not
/// sampled. Falls back to comma when nothing splits the header.
pub fn sniff_delimiter(content: &str) -> DelimiterGuess {
    CANDIDATES
        .into_iter()
        .map(|d| score_delimiter(content, d))
        .filter(|g| g.columns > 1)
        .reduce(|best, g| if g.rank() > best.rank() { g } else { best })
        .unwrap_or_else(|| score_delimiter(content, b','))
}

fn score_delimiter(content: &str, delimiter: u8) -> DelimiterGuess {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader
        .records()
        .filter_map(Result::ok)
        .filter(|r| !r.iter().all(|f| f.trim().is_empty()));

    let columns = records.next().map_or(0, |r| r.len());
    let mut guess = DelimiterGuess {
        delimiter: delimiter as char,
        columns,
        matching_rows: 0,
        sampled_rows: 0,
    };
    for record in records.take(SAMPLE_ROWS) {
        guess.sampled_rows += 1;
        if record.len() == columns {
            guess.matching_rows += 1;
        }
    }
    guess
}

/// Parse `content` into a header row and records. Records whose cells are all
/// blank are dropped; short records are kept and fail validation later.
pub fn read_table(content: &str, delimiter: u8) -> Result<SourceTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push(RawRow::from_record(line, &headers, record.iter()));
    }

    Ok(SourceTable {
        delimiter,
        headers,
        rows,
    })
}

fn csv_error(e: csv::Error) -> IngestError {
    IngestError::Csv {
        line: e.position().map(|p| p.line()),
        message: e.to_string(),
    }
}
