use std::collections::BTreeMap;

use consumption_client::domain::ConsumptionRecord;

use super::{
    batch::{Acceptance, ImportBatch, SkipReason},
    report::SheetReport,
    ImportSettings,
};
use crate::sources::{cell_at, Cell, Sheet};
use crate::transform::{
    columns::ColumnMap,
    date::{parse_date, DateContext},
    sanitize::{clean, has_division_error},
    validate_record,
    year::YearDetector,
};

/// Turns the rows of one data sheet into canonical records.
pub struct SheetImporter<'a> {
    settings: &'a ImportSettings,
    detector: YearDetector,
}

impl<'a> SheetImporter<'a> {
    pub fn new(settings: &'a ImportSettings) -> Self {
        Self {
            settings,
            detector: YearDetector {
                years: settings.years,
                sample_rows: settings.year_sample_rows,
            },
        }
    }

    /// Import every row of `sheet` into `batch`.
    ///
    /// Returns `None` for a sheet without data rows; such sheets touch no
    /// counters.
    pub fn import(&self, sheet: &Sheet, batch: &mut ImportBatch) -> Option<SheetReport> {
        if sheet.is_empty() {
            return None;
        }

        let year = self.detector.detect(sheet.rows(), sheet.name());
        let columns = ColumnMap::resolve(sheet.headers());
        let ctx = DateContext::new(year)
            .with_years(self.settings.years)
            .with_order(self.settings.date_order);

        let mapped: BTreeMap<String, String> = columns
            .describe(sheet.headers())
            .into_iter()
            .map(|(field, header)| (field.to_string(), header.to_string()))
            .collect();
        tracing::debug!(sheet = sheet.name(), year, columns = ?mapped, "resolved columns");

        batch.begin_sheet(year);

        for row in sheet.rows() {
            match self.read_row(row, &columns, &ctx, batch) {
                Ok(record) => {
                    let date = record.date.clone();
                    if let Acceptance::Replaced { previous_year } = batch.accept(record) {
                        tracing::debug!(sheet = sheet.name(), %date, previous_year, "replaced earlier row");
                    }
                }
                Err(reason) => batch.skip(reason),
            }
        }

        let tally = batch.sheet_tallies().last().cloned().unwrap_or_default();
        let (inserted, skipped) = (tally.inserted, tally.skipped());
        tracing::info!(
            sheet = sheet.name(),
            year,
            rows = sheet.rows().len(),
            inserted,
            skipped,
            "sheet imported"
        );

        Some(SheetReport {
            name: sheet.name().to_string(),
            detected_year: year,
            rows: sheet.rows().len(),
            inserted,
            skipped,
            skip_reasons: tally.skip_reasons,
            columns: mapped,
        })
    }

    fn read_row(
        &self,
        row: &[Cell],
        columns: &ColumnMap,
        ctx: &DateContext,
        batch: &ImportBatch,
    ) -> Result<ConsumptionRecord, SkipReason> {
        let date = parse_date(cell_at(row, Some(columns.date)), ctx)
            .ok_or(SkipReason::UnparseableDate)?;

        if batch.rejects_duplicate(&date) {
            return Err(SkipReason::DuplicateDate);
        }

        let value = |column: Option<usize>| clean(cell_at(row, column));
        let production = value(columns.production);

        let record = ConsumptionRecord {
            date,
            production_count: production.round() as i64,
            electricity_kwh: value(columns.electricity),
            water_m3: value(columns.water),
            cng_scm: value(columns.cng),
            air_m3: value(columns.air),
            electricity_target_per_car: value(columns.electricity_target),
            water_target_per_car: value(columns.water_target),
            cng_target_per_car: value(columns.cng_target),
            air_target_per_car: value(columns.air_target),
        };

        if has_division_error(cell_at(row, columns.electricity)) {
            return Err(SkipReason::FormulaError);
        }

        if production > self.settings.production_limit {
            return Err(SkipReason::ImplausibleProduction);
        }

        validate_record(&record, self.settings.years).map_err(|e| {
            tracing::warn!(error = %e, date = %record.date, "rejecting record");
            SkipReason::InvalidRecord
        })?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DuplicatePolicy;

    fn header() -> Vec<Cell> {
        [
            "Date",
            "Production",
            "Electricity (kWh)",
            "Electricity Target Per Car",
            "Water",
            "CNG",
            "Air",
        ]
        .into_iter()
        .map(Cell::text)
        .collect()
    }

    fn import(name: &str, rows: Vec<Vec<Cell>>) -> (Option<SheetReport>, ImportBatch) {
        let settings = ImportSettings::default();
        let mut grid = vec![header()];
        grid.extend(rows);
        let sheet = Sheet::from_grid(name, grid);

        let mut batch = ImportBatch::new(DuplicatePolicy::FirstWins);
        let report = SheetImporter::new(&settings).import(&sheet, &mut batch);
        (report, batch)
    }

    fn cells(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::text(*v)).collect()
    }

    #[test]
    fn rows_become_records() {
        let (report, batch) = import(
            "G1 2024",
            vec![
                cells(&["15/03/2024", "120", "1,500", "12.5", "40", "-", "#N/A"]),
                vec![Cell::Number(45_292.0), Cell::Number(0.0)],
            ],
        );

        let report = report.expect("non-empty sheet");
        assert_eq!(report.detected_year, 2024);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.columns.get("electricity").map(String::as_str), Some("Electricity (kWh)"));
        assert_eq!(
            report.columns.get("electricity_target").map(String::as_str),
            Some("Electricity Target Per Car")
        );

        let records = batch.into_records();
        assert_eq!(records[0].date, "2024-01-01");
        assert_eq!(records[0].production_count, 0);

        let r = &records[1];
        assert_eq!(r.date, "2024-03-15");
        assert_eq!(r.production_count, 120);
        assert_eq!(r.electricity_kwh, 1500.0);
        assert_eq!(r.electricity_target_per_car, 12.5);
        assert_eq!(r.water_m3, 40.0);
        assert_eq!(r.cng_scm, 0.0);
        assert_eq!(r.air_m3, 0.0);
    }

    #[test]
    fn two_digit_year_in_cell_beats_sheet_year() {
        let (_, batch) = import("G1 2019", vec![cells(&["1-Jan-24", "10"])]);
        assert_eq!(batch.into_records()[0].date, "2024-01-01");
    }

    #[test]
    fn bad_rows_are_counted_by_reason() {
        let (report, batch) = import(
            "G1 2024",
            vec![
                cells(&["Total", "900"]),
                cells(&["2024-01-01", "10", "#DIV/0!"]),
                cells(&["2024-01-02", "75000", "1"]),
                cells(&["2024-01-03", "10", "1"]),
                cells(&["03-Jan-2024", "11", "2"]),
            ],
        );

        let report = report.expect("non-empty sheet");
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.skip_reasons.get(&SkipReason::UnparseableDate), Some(&1));
        assert_eq!(report.skip_reasons.get(&SkipReason::FormulaError), Some(&1));
        assert_eq!(report.skip_reasons.get(&SkipReason::ImplausibleProduction), Some(&1));
        assert_eq!(report.skip_reasons.get(&SkipReason::DuplicateDate), Some(&1));
        assert_eq!(batch.by_year().get(&2024), Some(&1));
    }

    #[test]
    fn all_zero_rows_are_kept() {
        let (report, _) = import("G1 2024", vec![cells(&["2024-05-01", "0", "0", "0", "0", "0", "0"])]);
        assert_eq!(report.map(|r| r.inserted), Some(1));
    }

    #[test]
    fn header_only_sheet_is_empty() {
        let (report, batch) = import("G1 2024", Vec::new());
        assert!(report.is_none());
        assert!(batch.sheet_tallies().is_empty());
        assert!(batch.by_year().is_empty());
    }
}
