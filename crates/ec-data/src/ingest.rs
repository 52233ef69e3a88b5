//! Upload ingestion into a [`Dataset`].
//!
//! CSV and Excel workbooks share one cell normalization: null-like tokens
//! become [`Value::Null`], finite numbers become [`Value::Number`], anything
//! else stays text. Only the first worksheet of a workbook is read.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use ec_core::{Dataset, Error, Result, Row, Value, is_null_token};

/// Tabular upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    /// Comma-separated text with a header row.
    Csv,
    /// Spreadsheet workbook (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`).
    Excel,
}

impl UploadFormat {
    /// Format implied by a file name's extension. A name without an extension is CSV.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        match ext.as_deref() {
            None | Some("csv") => Some(UploadFormat::Csv),
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => Some(UploadFormat::Excel),
            Some(_) => None,
        }
    }
}

/// Type a single raw text cell.
pub fn parse_cell(raw: &str) -> Value {
    if is_null_token(raw) {
        return Value::Null;
    }
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Number(v),
        _ => Value::Text(trimmed.to_string()),
    }
}

/// Parse an upload according to `format`.
pub fn parse_upload(format: UploadFormat, bytes: &[u8]) -> Result<Dataset> {
    match format {
        UploadFormat::Csv => parse_csv(bytes),
        UploadFormat::Excel => parse_excel(bytes),
    }
}

/// Parse CSV bytes (header row required) into a dataset.
pub fn parse_csv(bytes: &[u8]) -> Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| Error::Ingest(format!("failed to read CSV header: {e}")))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record =
            record.map_err(|e| Error::Ingest(format!("failed to read CSV row {}: {e}", line + 1)))?;
        rows.push(record.iter().map(parse_cell).collect());
    }
    build_dataset("CSV", headers, rows)
}

/// Parse the first worksheet of an Excel or OpenDocument workbook.
///
/// The first row holds the column names. Rows with no values are skipped.
pub fn parse_excel(bytes: &[u8]) -> Result<Dataset> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::Ingest(format!("failed to open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Ingest("workbook has no worksheets".into()))?
        .map_err(|e| Error::Ingest(format!("failed to read worksheet: {e}")))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .map(|cells| cells.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();
    let rows = sheet_rows
        .map(|cells| cells.iter().map(excel_cell).collect::<Vec<Value>>())
        .filter(|row| !row.iter().all(Value::is_null))
        .collect();
    build_dataset("Excel", headers, rows)
}

fn excel_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(v) => Value::Number(*v as f64),
        Data::Float(v) if v.is_finite() => Value::Number(*v),
        Data::Float(_) => Value::Null,
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => parse_cell(s),
        other => Value::Text(other.to_string()),
    }
}

/// Read and parse a CSV or Excel file, choosing the format from its extension.
pub fn read_file(path: &Path) -> Result<Dataset> {
    let name = path.to_string_lossy();
    let format = UploadFormat::from_file_name(&name)
        .ok_or_else(|| Error::Ingest(format!("{name}: unsupported file type")))?;
    let bytes = std::fs::read(path)?;
    parse_upload(format, &bytes).map_err(|e| match e {
        Error::Ingest(msg) => Error::Ingest(format!("{name}: {msg}")),
        other => other,
    })
}

fn build_dataset(format: &str, headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Dataset> {
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(Error::Ingest(format!("{format} input has no columns")));
    }
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(Error::Ingest(format!("duplicate {format} column '{dup}'")));
    }
    if rows.is_empty() {
        return Err(Error::Ingest(format!("{format} input has a header but no data rows")));
    }

    let n_rows = rows.len();
    let dataset: Dataset = rows
        .into_iter()
        .map(|cells| headers.iter().cloned().zip(cells).collect::<Row>())
        .collect();
    log::debug!("parsed {format}: {n_rows} rows, {} columns", headers.len());
    Ok(dataset)
}
