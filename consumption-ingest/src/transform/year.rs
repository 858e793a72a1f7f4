use consumption_client::domain::YearRange;
use once_cell::sync::Lazy;
use regex::Regex;
use time::OffsetDateTime;

use super::date::{fix_century, serial_to_date};
use crate::sources::Cell;

pub const DEFAULT_SAMPLE_ROWS: usize = 30;

/// Numeric cells in this open interval are treated as date serials (1982..2064).
const SERIAL_WINDOW: (f64, f64) = (30_000.0, 60_000.0);

static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));
static TWO_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2})\b").expect("valid regex"));
static TRAILING_TWO_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-/.](\d{2})$").expect("valid regex"));

/// Infers the calendar year a sheet's rows belong to.
#[derive(Debug, Clone, Copy)]
pub struct YearDetector {
    pub years: YearRange,
    pub sample_rows: usize,
}

impl Default for YearDetector {
    fn default() -> Self {
        Self {
            years: YearRange::default(),
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl YearDetector {
    /// Most plausible year for a sheet.
    ///
    /// The sheet name wins when it carries a year; otherwise candidate years
    /// found in the first `sample_rows` rows are tallied and the most frequent
    /// one (first seen on ties) is returned. With no evidence at all the
    /// current calendar year is used.
    pub fn detect(&self, rows: &[Vec<Cell>], sheet_name: &str) -> i32 {
        if let Some(year) = self.year_from_name(sheet_name) {
            return year;
        }

        let mut votes = YearVotes::default();
        for row in rows.iter().take(self.sample_rows) {
            for cell in row {
                match cell {
                    Cell::Number(n) if *n > SERIAL_WINDOW.0 && *n < SERIAL_WINDOW.1 => {
                        if let Some(d) = serial_to_date(*n) {
                            let year = fix_century(d.year(), self.years);
                            if self.years.contains(year) {
                                votes.add(year);
                            }
                        }
                    }
                    Cell::Text(s) => {
                        if let Some(year) = self.first_four_digit_year(s) {
                            votes.add(year);
                        }
                        if let Some(year) = self.trailing_two_digit_year(s.trim()) {
                            votes.add(year);
                        }
                    }
                    _ => {}
                }
            }
        }

        votes
            .winner()
            .unwrap_or_else(|| OffsetDateTime::now_utc().year())
    }

    /// Year spelled out in a sheet name: `"G1 2023"`, `"Jan 24"`.
    pub fn year_from_name(&self, name: &str) -> Option<i32> {
        if let Some(year) = self.first_four_digit_year(name) {
            return Some(year);
        }
        TWO_DIGITS
            .captures_iter(name)
            .filter_map(|c| c[1].parse::<i32>().ok())
            .map(|yy| 2000 + yy)
            .find(|y| self.years.contains(*y))
    }

    fn first_four_digit_year(&self, s: &str) -> Option<i32> {
        FOUR_DIGITS
            .captures_iter(s)
            .filter_map(|c| c[1].parse::<i32>().ok())
            .find(|y| self.years.contains(*y))
    }

    fn trailing_two_digit_year(&self, s: &str) -> Option<i32> {
        let c = TRAILING_TWO_DIGITS.captures(s)?;
        let year = 2000 + c[1].parse::<i32>().ok()?;
        self.years.contains(year).then_some(year)
    }
}

/// Frequency count that remembers first-seen order for tie-breaking.
#[derive(Debug, Default)]
struct YearVotes {
    counts: Vec<(i32, usize)>,
}

impl YearVotes {
    fn add(&mut self, year: i32) {
        match self.counts.iter_mut().find(|(y, _)| *y == year) {
            Some((_, n)) => *n += 1,
            None => self.counts.push((year, 1)),
        }
    }

    fn winner(&self) -> Option<i32> {
        let mut best: Option<(i32, usize)> = None;
        for &(year, n) in &self.counts {
            if best.map_or(true, |(_, max)| n > max) {
                best = Some((year, n));
            }
        }
        best.map(|(year, _)| year)
    }
}
