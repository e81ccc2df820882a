use crate::error::{DashboardError, Result};
use crate::table::{Cell, RawTable};
use csv::ReaderBuilder;
use serde::Serialize;
use std::borrow::Cow;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEncoding {
    Utf8,
    Latin1,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub delimiter: char,
    pub encoding: SourceEncoding,
}

pub fn load_table(path: &Path) -> Result<(RawTable, LoadReport)> {
    let bytes = std::fs::read(path)?;
    let (table, report) = parse_bytes(&bytes)?;
    info!(
        path = %path.display(),
        rows = report.total_rows,
        skipped = report.skipped_rows,
        columns = table.headers.len(),
        "loaded dataset"
    );
    Ok((table, report))
}

/// Decode, sniff the delimiter and split into cells. Every non-blank cell
/// is kept as text; numeric conversion happens later.
pub fn parse_bytes(bytes: &[u8]) -> Result<(RawTable, LoadReport)> {
    let (decoded, encoding) = decode(bytes);
    let text = decoded.strip_prefix('\u{feff}').unwrap_or(decoded.as_ref());
    if text.trim().is_empty() {
        return Err(DashboardError::EmptyInput);
    }
    let delimiter = sniff_delimiter(text);

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut table = RawTable::new(headers);
    let mut total_rows = 0usize;
    let mut skipped_rows = 0usize;
    for result in rdr.records() {
        total_rows += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, row = total_rows, "skipping malformed row");
                skipped_rows += 1;
                continue;
            }
        };
        table.push_row(record.iter().map(Cell::from_text));
    }

    let report = LoadReport {
        total_rows,
        skipped_rows,
        delimiter,
        encoding,
    };
    Ok((table, report))
}

/// UTF-8 first, Latin-1 when the bytes are not valid UTF-8. Latin-1 maps
/// every byte to the code point of the same value, so it cannot fail.
pub fn decode(bytes: &[u8]) -> (Cow<'_, str>, SourceEncoding) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (Cow::Borrowed(s), SourceEncoding::Utf8),
        Err(_) => (
            Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
            SourceEncoding::Latin1,
        ),
    }
}

/// OFGL exports use `;`; comma wins only when it is strictly more frequent
/// on the header line.
pub fn sniff_delimiter(text: &str) -> char {
    let header = text.lines().next().unwrap_or("");
    let semis = header.matches(';').count();
    let commas = header.matches(',').count();
    if commas > semis {
        ','
    } else {
        ';'
    }
}
