use std::path::PathBuf;

use super::{csv_sheet_name, Cell, Sheet, Workbook};
use crate::pipeline::{PipelineError, Source};

/// A CSV export read as a one-sheet workbook named after the file stem.
///
/// Cells that parse as plain numbers become numeric cells so spreadsheet date
/// serials survive the export; everything else stays text.
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl Source for CsvFileSource {
    fn load(&self) -> Result<Workbook, PipelineError> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            PipelineError::Workbook(format!("failed to open CSV file {}: {e}", self.path.display()))
        })?;
        let file_name = self.path.to_string_lossy();
        read_csv_bytes(csv_sheet_name(&file_name), &bytes)
    }
}

fn csv_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::Text(field.to_string()),
    }
}

pub(crate) fn read_csv_bytes(sheet_name: &str, bytes: &[u8]) -> Result<Workbook, PipelineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for result in rdr.records() {
        let record = result
            .map_err(|e| PipelineError::Workbook(format!("failed to read CSV record: {e}")))?;
        grid.push(record.iter().map(csv_cell).collect());
    }

    Ok(Workbook::new(vec![Sheet::from_grid(sheet_name, grid)]).with_source_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_file_loads_as_single_sheet() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("tempfile");
        writeln!(file, "Date,Production Count,Electricity").unwrap();
        writeln!(file, "45292,120,\"1,500\"").unwrap();
        writeln!(file, "2-Jan-24,0,#DIV/0!").unwrap();

        let wb = CsvFileSource::new(file.path()).load().expect("csv loads");
        assert_eq!(wb.sheets().len(), 1);

        let sheet = &wb.sheets()[0];
        assert_eq!(sheet.headers(), ["Date", "Production Count", "Electricity"]);
        assert_eq!(sheet.rows()[0][0], Cell::Number(45292.0));
        assert_eq!(sheet.rows()[0][2], Cell::text("1,500"));
        assert_eq!(sheet.rows()[1][2], Cell::text("#DIV/0!"));
        assert!(wb.digest().is_some());
    }

    #[test]
    fn missing_csv_file_is_a_workbook_error() {
        let res = CsvFileSource::new("/nonexistent/plant.csv").load();
        assert!(matches!(res, Err(PipelineError::Workbook(_))));
    }
}
