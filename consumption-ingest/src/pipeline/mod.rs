pub mod batch;
pub mod report;
pub mod sheet;

use std::{sync::Arc, time::Instant};

use consumption_client::domain::{ConsumptionRecord, YearRange};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub use batch::{ImportBatch, SkipReason};
pub use report::{ImportReport, SheetReport};
pub use sheet::SheetImporter;

use crate::sources::Workbook;
use crate::transform::date::DateOrder;
use crate::transform::year::DEFAULT_SAMPLE_ROWS;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("workbook error: {0}")]
    Workbook(String),
    #[error("invalid record: {0}")]
    Transform(String),
    #[error("store error: {0}")]
    Store(String),
}

/// Something that yields a whole workbook.
pub trait Source: Send + Sync {
    fn load(&self) -> Result<Workbook, PipelineError>;
}

/// Keyed storage of canonical records (one row per date).
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Remove every record, returning how many were deleted.
    async fn clear_all(&self) -> Result<u64, PipelineError>;

    async fn insert(&self, records: &[ConsumptionRecord]) -> Result<(), PipelineError>;

    /// Records with `from <= date <= to`, oldest first.
    async fn query_by_date_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<ConsumptionRecord>, PipelineError>;

    /// Earliest and latest stored dates.
    async fn date_bounds(&self) -> Result<(Option<String>, Option<String>), PipelineError>;
}

#[async_trait::async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn clear_all(&self) -> Result<u64, PipelineError> {
        (**self).clear_all().await
    }

    async fn insert(&self, records: &[ConsumptionRecord]) -> Result<(), PipelineError> {
        (**self).insert(records).await
    }

    async fn query_by_date_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<ConsumptionRecord>, PipelineError> {
        (**self).query_by_date_range(from, to).await
    }

    async fn date_bounds(&self) -> Result<(Option<String>, Option<String>), PipelineError> {
        (**self).date_bounds().await
    }
}

/// What happens when a date already accepted in this import shows up again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    FirstWins,
    LastWins,
}

static COMBINED_YEARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2,4}\s*&\s*\d{2,4}").expect("valid regex"));

/// Decides which sheets hold raw daily rows.
///
/// Summary, comparison and chart sheets are recognised by name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetFilter {
    pub skip_prefixes: Vec<String>,
    /// Substrings such as `summ` or `comp`.
    pub skip_markers: Vec<String>,
    pub skip_names: Vec<String>,
}

impl Default for SheetFilter {
    fn default() -> Self {
        Self {
            skip_prefixes: vec!["t_".to_string()],
            skip_markers: vec!["summ".to_string(), "comp".to_string()],
            skip_names: vec!["sheet2".to_string(), "sheet3".to_string()],
        }
    }
}

impl SheetFilter {
    pub fn is_data_sheet(&self, name: &str) -> bool {
        let lower = name.trim().to_lowercase();

        if self.skip_prefixes.iter().any(|p| lower.starts_with(p.as_str())) {
            return false;
        }
        if self.skip_markers.iter().any(|m| lower.contains(m.as_str())) {
            return false;
        }
        if self.skip_names.iter().any(|n| lower == *n) {
            return false;
        }
        !COMBINED_YEARS.is_match(&lower)
    }
}

/// Tunables of one import run.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub years: YearRange,
    /// Rows producing more than this many units a day are summary rows.
    pub production_limit: f64,
    pub year_sample_rows: usize,
    pub date_order: DateOrder,
    pub duplicate_policy: DuplicatePolicy,
    pub sheet_filter: SheetFilter,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            years: YearRange::default(),
            production_limit: 50_000.0,
            year_sample_rows: DEFAULT_SAMPLE_ROWS,
            date_order: DateOrder::default(),
            duplicate_policy: DuplicatePolicy::default(),
            sheet_filter: SheetFilter::default(),
        }
    }
}

/// Runs a full-replace import of a workbook into a record store.
pub struct ImportCoordinator<K> {
    store: K,
    settings: ImportSettings,
}

impl<K> ImportCoordinator<K>
where
    K: RecordStore,
{
    pub fn new(store: K, settings: ImportSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    /// Replace the stored dataset with the records found in `workbook`.
    ///
    /// The store is purged only once the workbook is in hand, so an unreadable
    /// upload never loses data. Row-level problems are counted as skips.
    pub async fn import_workbook(&self, workbook: &Workbook) -> Result<ImportReport, PipelineError> {
        let started = Instant::now();
        metrics::counter!("import_runs_total").increment(1);

        let result = self.run(workbook).await;

        metrics::histogram!("import_duration_seconds").record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::counter!("import_failures_total").increment(1);
            tracing::error!(error = %e, "workbook import failed");
        }
        result
    }

    async fn run(&self, workbook: &Workbook) -> Result<ImportReport, PipelineError> {
        let data_sheets: Vec<_> = workbook
            .sheets()
            .iter()
            .filter(|s| self.settings.sheet_filter.is_data_sheet(s.name()))
            .collect();

        tracing::info!(
            sheets = workbook.sheets().len(),
            data_sheets = data_sheets.len(),
            skipped = workbook.sheets().len() - data_sheets.len(),
            "selected data sheets"
        );

        let deleted = self.store.clear_all().await?;
        tracing::info!(deleted, "cleared existing consumption records");

        let importer = SheetImporter::new(&self.settings);
        let mut batch = ImportBatch::new(self.settings.duplicate_policy);
        let selected = data_sheets.len();
        let mut sheet_reports = Vec::with_capacity(selected);

        for sheet in data_sheets {
            match importer.import(sheet, &mut batch) {
                Some(report) => sheet_reports.push(report),
                None => tracing::info!(sheet = sheet.name(), "sheet is empty, skipping"),
            }
        }

        let report = ImportReport::from_batch(&batch, selected, sheet_reports, workbook.digest());
        let records = batch.into_records();

        self.store.insert(&records).await?;

        metrics::counter!("import_rows_inserted_total").increment(report.total_inserted as u64);
        for (reason, count) in &report.skip_reasons {
            metrics::counter!("import_rows_skipped_total", "reason" => reason.as_str())
                .increment(*count as u64);
        }

        tracing::info!(
            sheets = report.sheets_processed,
            inserted = report.total_inserted,
            skipped = report.total_skipped,
            "workbook import complete"
        );

        Ok(report)
    }
}
