use std::collections::BTreeMap;

use serde::Serialize;

use super::batch::{ImportBatch, SkipReason};

/// Outcome of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetReport {
    pub name: String,
    pub detected_year: i32,
    pub rows: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub skip_reasons: BTreeMap<SkipReason, usize>,
    /// Field name to the header it was read from.
    pub columns: BTreeMap<String, String>,
}

/// Outcome of a whole workbook import, as returned to the uploader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub sheets_processed: usize,
    pub total_inserted: usize,
    pub total_skipped: usize,
    pub by_year: BTreeMap<i32, usize>,
    pub skip_reasons: BTreeMap<SkipReason, usize>,
    pub sheets: Vec<SheetReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_digest: Option<String>,
}

impl ImportReport {
    /// Build the final report once every sheet has been read.
    ///
    /// `sheets` holds one report per non-empty sheet, in the order the
    /// batch began them; their counts are refreshed from the batch because a
    /// later sheet may have superseded rows of an earlier one.
    /// `sheets_processed` is the number of selected data sheets, empty ones
    /// included.
    pub fn from_batch(
        batch: &ImportBatch,
        sheets_processed: usize,
        mut sheets: Vec<SheetReport>,
        digest: Option<&str>,
    ) -> Self {
        for (sheet, tally) in sheets.iter_mut().zip(batch.sheet_tallies()) {
            sheet.inserted = tally.inserted;
            sheet.skipped = tally.skipped();
            sheet.skip_reasons = tally.skip_reasons.clone();
        }

        Self {
            sheets_processed,
            total_inserted: batch.len(),
            total_skipped: batch.total_skipped(),
            by_year: batch.by_year(),
            skip_reasons: batch.skip_reasons(),
            sheets,
            source_digest: digest.map(str::to_string),
        }
    }
}
