//! Workbook inputs: the in-memory sheet model plus readers that build it from
//! spreadsheet files (via calamine) and CSV files.

pub mod csv_file;
pub mod spreadsheet;

use std::path::Path;

pub use csv_file::CsvFileSource;
pub use spreadsheet::{SpreadsheetBytesSource, SpreadsheetFileSource};

use crate::pipeline::{PipelineError, Source};

/// A raw spreadsheet cell as the importer sees it.
///
/// Date-formatted cells arrive as their serial `Number`; error cells arrive as
/// their error text (`#DIV/0!`, `#N/A`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

/// One worksheet: a header row and the data rows beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Build a sheet from a raw cell grid.
    ///
    /// The first non-blank row becomes the header. Blank header cells are
    /// named `__EMPTY`, `__EMPTY_1`, ... and repeated names get `_1`, `_2`
    /// suffixes so every column stays addressable. Fully blank data rows are
    /// dropped.
    pub fn from_grid(name: impl Into<String>, grid: Vec<Vec<Cell>>) -> Self {
        let mut rows = grid.into_iter().skip_while(|r| r.iter().all(Cell::is_blank));

        let headers = match rows.next() {
            Some(header_row) => unique_headers(&header_row),
            None => Vec::new(),
        };

        let rows = rows
            .filter(|r| !r.iter().all(Cell::is_blank))
            .collect();

        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cell at `column` in `row`, or an empty cell when the row is short.
pub fn cell_at(row: &[Cell], column: Option<usize>) -> &Cell {
    column.and_then(|c| row.get(c)).unwrap_or(&EMPTY_CELL)
}

fn header_text(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Cell::Number(n) => n.to_string(),
        Cell::Text(s) => s.trim().to_string(),
        Cell::Bool(b) => b.to_string().to_uppercase(),
    }
}

fn unique_headers(row: &[Cell]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(row.len());
    for cell in row {
        let mut base = header_text(cell);
        if base.is_empty() {
            base = "__EMPTY".to_string();
        }
        let mut candidate = base.clone();
        let mut n = 0;
        while out.contains(&candidate) {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        out.push(candidate);
    }
    out
}

/// A loaded workbook: its sheets in workbook order.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    digest: Option<String>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            digest: None,
        }
    }

    /// Attach the BLAKE3 digest of the bytes this workbook was read from.
    pub fn with_source_bytes(mut self, bytes: &[u8]) -> Self {
        self.digest = Some(blake3::hash(bytes).to_hex().to_string());
        self
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

fn is_csv_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".csv")
}

/// Pick a reader for a workbook on disk based on its extension.
pub fn source_for_path(path: &Path) -> Box<dyn Source> {
    if is_csv_name(&path.to_string_lossy()) {
        Box::new(CsvFileSource::new(path))
    } else {
        Box::new(SpreadsheetFileSource::new(path))
    }
}

/// Read an uploaded workbook; the optional file name selects CSV parsing.
pub fn load_uploaded(file_name: Option<&str>, bytes: Vec<u8>) -> Result<Workbook, PipelineError> {
    match file_name {
        Some(name) if is_csv_name(name) => csv_file::read_csv_bytes(csv_sheet_name(name), &bytes),
        _ => SpreadsheetBytesSource::new(bytes).load(),
    }
}

pub(crate) fn csv_sheet_name(file_name: &str) -> &str {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    base.rsplit_once('.').map_or(base, |(stem, _)| stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_is_first_non_blank_row() {
        let sheet = Sheet::from_grid(
            "G1 2023",
            vec![
                vec![Cell::Empty, Cell::text("  ")],
                vec![Cell::text("Date"), Cell::text("Water"), Cell::Empty, Cell::text("Water")],
                vec![Cell::text("1-Jan-23"), Cell::Number(5.0)],
                vec![Cell::Empty, Cell::Empty],
                vec![Cell::text("2-Jan-23"), Cell::Number(6.0)],
            ],
        );

        assert_eq!(sheet.headers(), ["Date", "Water", "__EMPTY", "Water_1"]);
        assert_eq!(sheet.rows().len(), 2);
    }

    #[test]
    fn short_rows_read_as_empty_cells() {
        let row = vec![Cell::Number(1.0)];
        assert_eq!(cell_at(&row, Some(0)), &Cell::Number(1.0));
        assert_eq!(cell_at(&row, Some(3)), &Cell::Empty);
        assert_eq!(cell_at(&row, None), &Cell::Empty);
    }

    #[test]
    fn digest_is_stable_for_same_bytes() {
        let a = Workbook::new(Vec::new()).with_source_bytes(b"abc");
        let b = Workbook::new(Vec::new()).with_source_bytes(b"abc");
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().map(str::len), Some(64));
    }

    #[test]
    fn csv_sheet_is_named_after_file_stem() {
        assert_eq!(csv_sheet_name("uploads/plant 2024.csv"), "plant 2024");
        assert_eq!(csv_sheet_name("daily"), "daily");
    }
}
