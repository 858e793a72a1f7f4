use std::collections::BTreeMap;

use consumption_client::domain::ConsumptionRecord;
use serde::Serialize;

use super::DuplicatePolicy;

/// Why a row did not become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnparseableDate,
    DuplicateDate,
    FormulaError,
    ImplausibleProduction,
    InvalidRecord,
    /// Accepted first, then replaced by a later row under `last_wins`.
    Superseded,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::UnparseableDate => "unparseable_date",
            SkipReason::DuplicateDate => "duplicate_date",
            SkipReason::FormulaError => "formula_error",
            SkipReason::ImplausibleProduction => "implausible_production",
            SkipReason::InvalidRecord => "invalid_record",
            SkipReason::Superseded => "superseded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    New,
    Replaced { previous_year: i32 },
}

/// Running counters of one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetTally {
    pub year: i32,
    pub inserted: usize,
    pub skip_reasons: BTreeMap<SkipReason, usize>,
}

impl SheetTally {
    pub fn skipped(&self) -> usize {
        self.skip_reasons.values().sum()
    }

    fn skip(&mut self, reason: SkipReason) {
        *self.skip_reasons.entry(reason).or_insert(0) += 1;
    }
}

/// Per-import state: accepted records keyed by date plus one tally per
/// non-empty sheet. One value per import, threaded through every sheet.
///
/// Every accepted record remembers the sheet it came from, so a `last_wins`
/// replacement is taken back out of that sheet's count.
#[derive(Debug)]
pub struct ImportBatch {
    policy: DuplicatePolicy,
    accepted: BTreeMap<String, (ConsumptionRecord, usize)>,
    sheets: Vec<SheetTally>,
}

impl ImportBatch {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            accepted: BTreeMap::new(),
            sheets: Vec::new(),
        }
    }

    /// Open the tally of a non-empty sheet attributed to `year`. Rows
    /// accepted or skipped afterwards count against it.
    pub fn begin_sheet(&mut self, year: i32) {
        self.sheets.push(SheetTally {
            year,
            ..SheetTally::default()
        });
    }

    fn current(&mut self) -> usize {
        if self.sheets.is_empty() {
            self.sheets.push(SheetTally::default());
        }
        self.sheets.len() - 1
    }

    /// True when `date` must be skipped before the row is even sanitized.
    pub fn rejects_duplicate(&self, date: &str) -> bool {
        self.policy == DuplicatePolicy::FirstWins && self.accepted.contains_key(date)
    }

    pub fn skip(&mut self, reason: SkipReason) {
        let idx = self.current();
        self.sheets[idx].skip(reason);
    }

    /// Take a validated record into the current sheet.
    ///
    /// A replaced record leaves its own sheet's `inserted` count and is
    /// tallied there as [`SkipReason::Superseded`].
    pub fn accept(&mut self, record: ConsumptionRecord) -> Acceptance {
        let idx = self.current();
        self.sheets[idx].inserted += 1;

        match self.accepted.insert(record.date.clone(), (record, idx)) {
            None => Acceptance::New,
            Some((_, previous)) => {
                let earlier = &mut self.sheets[previous];
                earlier.inserted = earlier.inserted.saturating_sub(1);
                earlier.skip(SkipReason::Superseded);
                Acceptance::Replaced {
                    previous_year: earlier.year,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Tallies of the sheets begun so far, in import order.
    pub fn sheet_tallies(&self) -> &[SheetTally] {
        &self.sheets
    }

    /// Surviving records per detected year. Every begun sheet's year is
    /// present, even when all of its rows were skipped.
    pub fn by_year(&self) -> BTreeMap<i32, usize> {
        let mut out = BTreeMap::new();
        for sheet in &self.sheets {
            *out.entry(sheet.year).or_insert(0) += sheet.inserted;
        }
        out
    }

    pub fn skip_reasons(&self) -> BTreeMap<SkipReason, usize> {
        let mut out = BTreeMap::new();
        for (reason, n) in self.sheets.iter().flat_map(|s| &s.skip_reasons) {
            *out.entry(*reason).or_insert(0) += n;
        }
        out
    }

    pub fn total_skipped(&self) -> usize {
        self.sheets.iter().map(SheetTally::skipped).sum()
    }

    /// Accepted records, oldest first.
    pub fn into_records(self) -> Vec<ConsumptionRecord> {
        self.accepted.into_values().map(|(r, _)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_wins_rejects_seen_dates() {
        let mut batch = ImportBatch::new(DuplicatePolicy::FirstWins);
        batch.begin_sheet(2024);
        assert!(!batch.rejects_duplicate("2024-01-01"));
        assert_eq!(batch.accept(ConsumptionRecord::empty("2024-01-01")), Acceptance::New);
        assert!(batch.rejects_duplicate("2024-01-01"));
    }

    #[test]
    fn last_wins_replaces_and_moves_tally() {
        let mut batch = ImportBatch::new(DuplicatePolicy::LastWins);
        batch.begin_sheet(2023);
        batch.accept(ConsumptionRecord::empty("2024-01-01"));
        batch.begin_sheet(2024);
        assert!(!batch.rejects_duplicate("2024-01-01"));

        let mut later = ConsumptionRecord::empty("2024-01-01");
        later.production_count = 7;
        assert_eq!(batch.accept(later), Acceptance::Replaced { previous_year: 2023 });

        assert_eq!(batch.by_year().get(&2023), Some(&0));
        assert_eq!(batch.by_year().get(&2024), Some(&1));
        assert_eq!(batch.total_skipped(), 1);

        let tallies = batch.sheet_tallies();
        assert_eq!(tallies[0].inserted, 0);
        assert_eq!(tallies[0].skip_reasons.get(&SkipReason::Superseded), Some(&1));
        assert_eq!(tallies[1].inserted, 1);
        assert_eq!(tallies[1].skipped(), 0);

        assert_eq!(batch.into_records()[0].production_count, 7);
    }

    #[test]
    fn replacement_within_one_sheet_stays_in_that_sheet() {
        let mut batch = ImportBatch::new(DuplicatePolicy::LastWins);
        batch.begin_sheet(2024);
        batch.accept(ConsumptionRecord::empty("2024-01-01"));
        batch.accept(ConsumptionRecord::empty("2024-01-01"));

        let tally = &batch.sheet_tallies()[0];
        assert_eq!(tally.inserted, 1);
        assert_eq!(tally.skipped(), 1);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn totals_are_the_sum_of_sheet_tallies() {
        let mut batch = ImportBatch::new(DuplicatePolicy::FirstWins);
        batch.begin_sheet(2023);
        batch.accept(ConsumptionRecord::empty("2023-01-01"));
        batch.skip(SkipReason::FormulaError);
        batch.begin_sheet(2024);
        batch.skip(SkipReason::FormulaError);
        batch.skip(SkipReason::UnparseableDate);

        assert_eq!(batch.total_skipped(), 3);
        assert_eq!(batch.skip_reasons().get(&SkipReason::FormulaError), Some(&2));
        assert_eq!(batch.by_year().get(&2024), Some(&0));
    }

    #[test]
    fn records_come_out_in_date_order() {
        let mut batch = ImportBatch::new(DuplicatePolicy::default());
        batch.begin_sheet(2024);
        for d in ["2024-02-01", "2023-12-31", "2024-01-15"] {
            batch.accept(ConsumptionRecord::empty(d));
        }
        let dates: Vec<String> = batch.into_records().into_iter().map(|r| r.date).collect();
        assert_eq!(dates, ["2023-12-31", "2024-01-15", "2024-02-01"]);
    }

    #[test]
    fn skip_reasons_serialize_snake_case() {
        let json = serde_json::to_string(&SkipReason::ImplausibleProduction).unwrap();
        assert_eq!(json, "\"implausible_production\"");
        assert_eq!(SkipReason::UnparseableDate.as_str(), "unparseable_date");
    }
}
