use time::{Date, Month};

/// One day of plant-wide utility consumption.
///
/// `date` is always a zero-padded `YYYY-MM-DD` string, so lexical order is
/// chronological order. Target columns hold a per-car goal, with `0.0` meaning
/// no target was supplied for that day.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsumptionRecord {
    pub date: String,
    pub production_count: i64,
    pub electricity_kwh: f64,
    pub water_m3: f64,
    pub cng_scm: f64,
    pub air_m3: f64,
    pub electricity_target_per_car: f64,
    pub water_target_per_car: f64,
    pub cng_target_per_car: f64,
    pub air_target_per_car: f64,
}

impl ConsumptionRecord {
    /// An all-zero record for `date`.
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            production_count: 0,
            electricity_kwh: 0.0,
            water_m3: 0.0,
            cng_scm: 0.0,
            air_m3: 0.0,
            electricity_target_per_car: 0.0,
            water_target_per_car: 0.0,
            cng_target_per_car: 0.0,
            air_target_per_car: 0.0,
        }
    }

    pub fn day(&self) -> Option<Date> {
        parse_day(&self.date)
    }

    pub fn year(&self) -> Option<i32> {
        self.date.get(0..4).and_then(|y| y.parse().ok())
    }
}

/// Parse a canonical `YYYY-MM-DD` string.
pub fn parse_day(s: &str) -> Option<Date> {
    let mut parts = s.trim().splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Render a date as canonical `YYYY-MM-DD`.
pub fn format_day(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Inclusive range of calendar years the dataset accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self::new(2012, 2030)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parse_and_format_day_agree() {
        let d = parse_day("2024-03-05").expect("valid day");
        assert_eq!(d, date!(2024-03-05));
        assert_eq!(format_day(d), "2024-03-05");
    }

    #[test]
    fn parse_day_rejects_impossible_dates() {
        assert!(parse_day("2023-02-29").is_none());
        assert!(parse_day("2024-13-01").is_none());
        assert!(parse_day("not a date").is_none());
    }

    #[test]
    fn record_year_comes_from_date_prefix() {
        let r = ConsumptionRecord::empty("2019-07-01");
        assert_eq!(r.year(), Some(2019));
        assert_eq!(r.day(), Some(date!(2019-07-01)));
    }

    #[test]
    fn default_year_range_is_inclusive() {
        let range = YearRange::default();
        assert!(range.contains(2012));
        assert!(range.contains(2030));
        assert!(!range.contains(2011));
        assert!(!range.contains(2031));
    }
}
