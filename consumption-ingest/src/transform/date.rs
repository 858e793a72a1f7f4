//! Date cell normalization.
//!
//! A cell is tried against an ordered list of independent matchers. Each
//! matcher either recognises its format (and yields a date or a rejection) or
//! passes, leaving the cell to the next one.

use consumption_client::domain::{format_day, YearRange};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use time::{macros::date, Date, Duration, Month};

use crate::sources::Cell;

/// Day zero of spreadsheet date serials (1900 date system, leap-bug adjusted).
pub const SERIAL_EPOCH: Date = date!(1899-12-30);

/// Serials past this are not calendar dates (Excel's limit is 9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Reading order for ambiguous `NN/NN/YYYY` dates where both parts are <= 12.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

/// Everything a matcher needs besides the cell itself.
#[derive(Debug, Clone, Copy)]
pub struct DateContext {
    /// Year substituted when the cell's own year is missing or implausible.
    pub fallback_year: i32,
    pub years: YearRange,
    pub order: DateOrder,
}

impl DateContext {
    pub fn new(fallback_year: i32) -> Self {
        Self {
            fallback_year,
            years: YearRange::default(),
            order: DateOrder::default(),
        }
    }

    pub fn with_order(mut self, order: DateOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Matched(Date),
    Rejected,
    NoMatch,
}

impl From<Option<Date>> for Outcome {
    fn from(d: Option<Date>) -> Self {
        d.map_or(Outcome::Rejected, Outcome::Matched)
    }
}

type Matcher = fn(&str, &DateContext) -> Outcome;

const TEXT_MATCHERS: [Matcher; 6] = [
    reject_non_day_rows,
    year_first,
    day_month_name_year,
    numeric_day_month_year,
    month_name_day_year,
    loose_calendar_text,
];

static MONTH_YEAR_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{3,9}[-/.]\d{2,4}$").expect("valid regex"));
static YEAR_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:[T\s].*)?$").expect("valid regex")
});
static DAY_MONTH_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[-/.]([A-Za-z]{3,9})[-/.](\d{2,4})$").expect("valid regex")
});
static NUMERIC_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{2,4})$").expect("valid regex"));
static MONTH_NAME_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{3,9})\s*(\d{1,2})[,\s]+(\d{2,4})$").expect("valid regex")
});

const NON_DAY_MARKERS: [&str; 5] = ["total", "summary", "week", "grand", "average"];

const WEEKDAYS: [&str; 17] = [
    "mon", "monday", "tue", "tues", "tuesday", "wed", "wednesday", "thu", "thur", "thurs",
    "thursday", "fri", "friday", "sat", "saturday", "sun", "sunday",
];

/// Month number for an English month name or abbreviation.
pub fn month_from_name(name: &str) -> Option<u8> {
    let m = match name.to_ascii_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(m)
}

/// Map 2-digit and last-century years into the supported range.
///
/// `24` becomes 2024 and `1924` becomes 2024 when 2024 is supported; anything
/// else is returned unchanged.
pub fn fix_century(year: i32, years: YearRange) -> i32 {
    match year {
        0..=99 if years.contains(2000 + year) => 2000 + year,
        1900..=1999 if years.contains(year + 100) => year + 100,
        _ => year,
    }
}

fn resolve_year(year: i32, ctx: &DateContext) -> i32 {
    let fixed = fix_century(year, ctx.years);
    if ctx.years.contains(fixed) {
        fixed
    } else {
        ctx.fallback_year
    }
}

/// Build a calendar date from raw parts, applying the year correction.
///
/// `None` when the parts are not a real day or the year ends up unsupported.
fn build(year: i32, month: u32, day: u32, ctx: &DateContext) -> Option<Date> {
    let year = resolve_year(year, ctx);
    if !ctx.years.contains(year) {
        return None;
    }
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    Date::from_calendar_date(year, month, u8::try_from(day).ok()?).ok()
}

/// Calendar day of a spreadsheet serial; any time-of-day fraction is dropped.
pub fn serial_to_date(serial: f64) -> Option<Date> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    SERIAL_EPOCH.checked_add(Duration::days(serial.floor() as i64))
}

fn from_serial(serial: f64, ctx: &DateContext) -> Option<Date> {
    let d = serial_to_date(serial)?;
    if ctx.years.contains(d.year()) {
        return Some(d);
    }
    build(d.year(), u8::from(d.month()).into(), d.day().into(), ctx)
}

/// Normalize a date cell to a calendar day.
pub fn normalize_date(cell: &Cell, ctx: &DateContext) -> Option<Date> {
    match cell {
        Cell::Number(n) => from_serial(*n, ctx),
        Cell::Text(s) => {
            let txt = s.trim();
            if txt.is_empty() {
                return None;
            }
            TEXT_MATCHERS
                .iter()
                .map(|m| m(txt, ctx))
                .find(|o| *o != Outcome::NoMatch)
                .and_then(|o| match o {
                    Outcome::Matched(d) => Some(d),
                    _ => None,
                })
        }
        Cell::Empty | Cell::Bool(_) => None,
    }
}

/// Normalize a date cell to canonical `YYYY-MM-DD`, or `None` to skip the row.
pub fn parse_date(cell: &Cell, ctx: &DateContext) -> Option<String> {
    normalize_date(cell, ctx).map(format_day)
}

fn num(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

/// Summary rows and bare month headers repeated down the date column.
fn reject_non_day_rows(txt: &str, _: &DateContext) -> Outcome {
    let lower = txt.to_ascii_lowercase();
    if lower == "date" || NON_DAY_MARKERS.iter().any(|m| lower.contains(m)) {
        return Outcome::Rejected;
    }
    if MONTH_YEAR_ONLY.is_match(txt) {
        return Outcome::Rejected;
    }
    Outcome::NoMatch
}

/// `2024-03-15`, `2024/3/15`, `2024-03-15T00:00:00`.
fn year_first(txt: &str, ctx: &DateContext) -> Outcome {
    let Some(c) = YEAR_FIRST.captures(txt) else {
        return Outcome::NoMatch;
    };
    build(num(&c[1]) as i32, num(&c[2]), num(&c[3]), ctx).into()
}

/// `1-Jan-24`, `15.March.2024`.
fn day_month_name_year(txt: &str, ctx: &DateContext) -> Outcome {
    let Some(c) = DAY_MONTH_NAME.captures(txt) else {
        return Outcome::NoMatch;
    };
    let Some(month) = month_from_name(&c[2]) else {
        return Outcome::Rejected;
    };
    build(num(&c[3]) as i32, month.into(), num(&c[1]), ctx).into()
}

/// `15/03/2024`, `3/15/24`: a part above 12 must be the day, otherwise the
/// configured order decides, with the other reading as a fallback.
fn numeric_day_month_year(txt: &str, ctx: &DateContext) -> Outcome {
    let Some(c) = NUMERIC_DMY.captures(txt) else {
        return Outcome::NoMatch;
    };
    let (first, second, year) = (num(&c[1]), num(&c[2]), num(&c[3]) as i32);

    let day_first = if first > 12 {
        true
    } else if second > 12 {
        false
    } else {
        ctx.order == DateOrder::DayFirst
    };

    let (day, month) = if day_first { (first, second) } else { (second, first) };
    build(year, month, day, ctx)
        .or_else(|| build(year, day, month, ctx))
        .into()
}

/// `Jan 1, 2024`, `March 15 2024`.
fn month_name_day_year(txt: &str, ctx: &DateContext) -> Outcome {
    let Some(c) = MONTH_NAME_DAY.captures(txt) else {
        return Outcome::NoMatch;
    };
    let Some(month) = month_from_name(&c[1]) else {
        return Outcome::Rejected;
    };
    build(num(&c[3]) as i32, month.into(), num(&c[2]), ctx).into()
}

/// Free-form text such as `Monday, 15 January 2024` or `15th Jan 2024`.
///
/// Accepts only when exactly one month name, one day and one year are found.
fn loose_calendar_text(txt: &str, ctx: &DateContext) -> Outcome {
    let mut month = None;
    let mut day = None;
    let mut year = None;

    for token in txt.split(|c: char| c.is_whitespace() || matches!(c, ',' | '-' | '/' | '.')) {
        if token.is_empty() || token.contains(':') {
            continue;
        }
        let lower = token.to_ascii_lowercase();
        if WEEKDAYS.contains(&lower.as_str()) {
            continue;
        }
        if let Some(m) = month_from_name(&lower) {
            if month.replace(m).is_some() {
                return Outcome::NoMatch;
            }
            continue;
        }

        let digits = lower
            .strip_suffix("st")
            .or_else(|| lower.strip_suffix("nd"))
            .or_else(|| lower.strip_suffix("rd"))
            .or_else(|| lower.strip_suffix("th"))
            .unwrap_or(&lower);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Outcome::NoMatch;
        }

        match digits.len() {
            4 if year.is_none() => year = Some(num(digits) as i32),
            1 | 2 if day.is_none() => day = Some(num(digits)),
            2 if year.is_none() => year = Some(num(digits) as i32),
            _ => return Outcome::NoMatch,
        }
    }

    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => match build(y, m.into(), d, ctx) {
            Some(date) => Outcome::Matched(date),
            None => Outcome::NoMatch,
        },
        _ => Outcome::NoMatch,
    }
}
