//! Tabular decoder
//!
//! Turns a delimited text file or the first sheet of a workbook into an owned,
//! re-iterable [`DecodedTable`]. Leading comment, description and example rows
//! are skipped and the header row is detected automatically.

use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::error::DecodeError;

/// Marks a comment cell in templates
pub const COMMENT_MARKER: char = '#';

/// Trailing marker templates put on required column names
const REQUIRED_MARKER: char = '*';

/// First-cell fragments of rows that describe the template instead of data
const NON_DATA_MARKERS: &[&str] = &[
    "template",
    "description",
    "required",
    "optional",
    "example",
    "模板",
    "说明",
    "必填",
    "选填",
    "示例",
];

/// Raw cell value as read from the source
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Empty,
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed textual form. Integral floats lose their fractional part so a
    /// numeric student id typed into a spreadsheet reads back as `2021001`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                (*f as i64).to_string()
            }
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Empty => String::new(),
        }
    }

    fn is_comment(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.trim_start().starts_with(COMMENT_MARKER))
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// Declared format of an import source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma separated text
    Delimited,
    /// Spreadsheet workbook (xlsx/xlsm/xls/ods)
    Workbook,
}

impl SourceFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self, DecodeError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" | "txt" => Ok(SourceFormat::Delimited),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(SourceFormat::Workbook),
            _ => Err(DecodeError::UnsupportedFormat(ext)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DecodeOptions {
    /// Header names that identify a comment-marked row as the real header
    pub header_hints: Vec<String>,
    /// Field delimiter for the delimited path
    pub delimiter: u8,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            header_hints: Vec::new(),
            delimiter: b',',
        }
    }
}

/// One admitted data row
#[derive(Clone, Debug, PartialEq)]
pub struct RawRow {
    /// 1-based row number in the source sheet
    pub row: usize,
    pub cells: HashMap<String, CellValue>,
}

impl RawRow {
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.get(header)
    }
}

/// Decoded rows, owned so they can be walked any number of times
#[derive(Clone, Debug, Default)]
pub struct DecodedTable {
    pub headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl DecodedTable {
    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RawRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decode a file whose format is detected from its extension
pub fn decode_path(path: &Path, options: &DecodeOptions) -> Result<DecodedTable, DecodeError> {
    let format = SourceFormat::from_path(path)?;
    decode_file(path, format, options)
}

/// Decode a file with an explicitly declared format
pub fn decode_file(
    path: &Path,
    format: SourceFormat,
    options: &DecodeOptions,
) -> Result<DecodedTable, DecodeError> {
    match format {
        SourceFormat::Delimited => {
            let file = File::open(path)?;
            decode_delimited(file, options)
        }
        SourceFormat::Workbook => decode_workbook(path, options),
    }
}

/// Decode delimited text from any reader
pub fn decode_delimited<R: Read>(
    reader: R,
    options: &DecodeOptions,
) -> Result<DecodedTable, DecodeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // 列数校验在 build_table 中按行处理
        .delimiter(options.delimiter)
        .from_reader(reader);

    // Blank lines are skipped by the reader, so keep the real line numbers
    let mut grid = Vec::new();
    for (idx0, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(idx0 + 1);
        let cells: Vec<CellValue> = record
            .iter()
            .map(|value| {
                if value.trim().is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(value.to_string())
                }
            })
            .collect();
        grid.push((line, cells));
    }

    build_table(grid, options, true)
}

fn decode_workbook(path: &Path, options: &DecodeOptions) -> Result<DecodedTable, DecodeError> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DecodeError::EmptyWorkbook)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    // Range starts at the first used cell; keep sheet row numbers accurate
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let grid: Vec<(usize, Vec<CellValue>)> = range
        .rows()
        .enumerate()
        .map(|(idx0, row)| (first_row + idx0 + 1, row.iter().map(CellValue::from).collect()))
        .collect();

    build_table(grid, options, false)
}

/// Detect the header, then admit data rows below it.
///
/// Grid rows carry their 1-based source row number. With `strict_width` a row
/// whose cell count differs from the header is dropped; otherwise short rows
/// are mapped by position.
fn build_table(
    grid: Vec<(usize, Vec<CellValue>)>,
    options: &DecodeOptions,
    strict_width: bool,
) -> Result<DecodedTable, DecodeError> {
    let header_idx = find_header(&grid, &options.header_hints).ok_or(DecodeError::NoHeaderFound)?;

    let headers: Vec<String> = grid[header_idx]
        .1
        .iter()
        .map(|cell| normalize_header(&cell.as_text()))
        .collect();

    let mut rows = Vec::new();
    for (user_row, cells) in grid.iter().skip(header_idx + 1) {
        let user_row = *user_row;
        let first = cells.first().unwrap_or(&CellValue::Empty);
        if first.is_blank() || first.is_comment() {
            continue;
        }

        if strict_width && cells.len() != headers.len() {
            tracing::warn!(
                "Dropping row {}: {} cells, header has {} columns",
                user_row,
                cells.len(),
                headers.len()
            );
            continue;
        }

        let mut mapped = HashMap::with_capacity(headers.len());
        for (col_idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = cells.get(col_idx).cloned().unwrap_or(CellValue::Empty);
            mapped.insert(header.clone(), value);
        }

        rows.push(RawRow {
            row: user_row,
            cells: mapped,
        });
    }

    tracing::debug!("Decoded {} rows, header at row {}", rows.len(), grid[header_idx].0);

    Ok(DecodedTable { headers, rows })
}

fn find_header(grid: &[(usize, Vec<CellValue>)], hints: &[String]) -> Option<usize> {
    grid.iter().position(|(_, row)| {
        let first = row.first().unwrap_or(&CellValue::Empty);
        if first.is_blank() {
            return false;
        }

        let text = first.as_text();
        if first.is_comment() {
            // A commented header is still the header when it names a known column
            let stripped = normalize_header(&text);
            return hints.iter().any(|hint| hint.eq_ignore_ascii_case(&stripped));
        }

        !is_non_data_marker(&text)
    })
}

fn is_non_data_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    NON_DATA_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Strip BOM, comment marker and required marker from a header cell
fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .trim_start_matches(COMMENT_MARKER)
        .trim()
        .trim_end_matches(REQUIRED_MARKER)
        .trim()
        .to_string()
}
