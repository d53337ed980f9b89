// Raw table loading from delimited files and spreadsheet workbooks

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::info;

use super::{IngestError, IngestResult};

/// An untyped table as read from disk: headers plus string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of a header by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// All cells of one column, padded with empty strings for short rows.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}

/// Name and row count of one workbook sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub name: String,
    pub rows: usize,
}

/// What `load` produced: a table, or a sheet list the caller must pick from.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Table(RawTable),
    Sheets(Vec<SheetInfo>),
}

/// Read a delimited or spreadsheet source.
///
/// Single-sheet workbooks and delimited files come back as a table;
/// multi-sheet workbooks come back as a sheet list, and the caller follows
/// up with [`load_sheet`].
pub fn load(path: &Path) -> IngestResult<LoadOutcome> {
    match extension(path).as_str() {
        "csv" | "tsv" | "txt" => Ok(LoadOutcome::Table(load_delimited(path)?)),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook(path),
        other => Err(IngestError::UnsupportedFormat(other.to_string())),
    }
}

/// Read one named sheet of a workbook.
pub fn load_sheet(path: &Path, sheet: &str) -> IngestResult<RawTable> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|_| IngestError::SheetNotFound(sheet.to_string()))?;
    range_to_table(range.rows())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn load_delimited(path: &Path) -> IngestResult<RawTable> {
    let delimiter = if extension(path) == "tsv" { b'\t' } else { b',' };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if headers.is_empty() {
        return Err(IngestError::EmptyTable);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect());
    }
    if rows.is_empty() {
        return Err(IngestError::EmptyTable);
    }

    info!(path = %path.display(), rows = rows.len(), "loaded delimited table");
    Ok(RawTable { headers, rows })
}

fn load_workbook(path: &Path) -> IngestResult<LoadOutcome> {
    let mut workbook = open_workbook_auto(path)?;
    let names: Vec<String> = workbook.sheet_names().to_vec();

    if names.len() == 1 {
        let range = workbook
            .worksheet_range(&names[0])
            .map_err(|_| IngestError::SheetNotFound(names[0].clone()))?;
        return Ok(LoadOutcome::Table(range_to_table(range.rows())?));
    }

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let rows = workbook
            .worksheet_range(&name)
            .map(|range| range.height().saturating_sub(1))
            .unwrap_or(0);
        sheets.push(SheetInfo { name, rows });
    }
    info!(path = %path.display(), sheets = sheets.len(), "workbook needs sheet selection");
    Ok(LoadOutcome::Sheets(sheets))
}

fn range_to_table<'a>(
    mut rows: impl Iterator<Item = &'a [Data]>,
) -> IngestResult<RawTable> {
    let headers: Vec<String> = rows
        .next()
        .ok_or(IngestError::EmptyTable)?
        .iter()
        .map(cell_to_string)
        .collect();

    let body: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    if body.is_empty() {
        return Err(IngestError::EmptyTable);
    }

    Ok(RawTable {
        headers,
        rows: body,
    })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}
