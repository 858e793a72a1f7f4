use std::{
    io::{Cursor, Read, Seek},
    path::PathBuf,
};

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};

use super::{Cell, Sheet, Workbook};
use crate::pipeline::{PipelineError, Source};

/// Spreadsheet workbook on disk (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`).
pub struct SpreadsheetFileSource {
    path: PathBuf,
}

impl SpreadsheetFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl Source for SpreadsheetFileSource {
    fn load(&self) -> Result<Workbook, PipelineError> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            PipelineError::Workbook(format!("failed to read {}: {e}", self.path.display()))
        })?;
        SpreadsheetBytesSource::new(bytes).load()
    }
}

/// Spreadsheet workbook already in memory, e.g. an HTTP upload.
pub struct SpreadsheetBytesSource {
    bytes: Vec<u8>,
}

impl SpreadsheetBytesSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl Source for SpreadsheetBytesSource {
    fn load(&self) -> Result<Workbook, PipelineError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(self.bytes.clone()))
            .map_err(|e| PipelineError::Workbook(format!("failed to open workbook: {e}")))?;
        let sheets = read_sheets(&mut workbook)?;
        Ok(Workbook::new(sheets).with_source_bytes(&self.bytes))
    }
}

fn read_sheets<RS>(workbook: &mut Sheets<RS>) -> Result<Vec<Sheet>, PipelineError>
where
    RS: Read + Seek,
{
    let names = workbook.sheet_names().to_owned();
    let mut sheets = Vec::with_capacity(names.len());

    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| PipelineError::Workbook(format!("failed to read sheet '{name}': {e}")))?;

        let grid = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();

        sheets.push(Sheet::from_grid(name, grid));
    }

    Ok(sheets)
}

fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        // Date cells keep their serial so the date normalizer sees the exact day.
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
