use std::collections::BTreeMap;

use time::Date;

use super::{per_car, round2, round_i, MONTH_ABBR};
use crate::domain::{ConsumptionRecord, YearRange};

/// Ranges longer than this many days are tabulated per month instead of per day.
const DAILY_TABLE_MAX_DAYS: i64 = 31;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Summary {
    pub electricity: i64,
    pub water: i64,
    pub cng: i64,
    pub air: i64,
    pub production: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PerCar {
    pub electricity: f64,
    pub water: f64,
    pub cng: f64,
    pub air: f64,
}

/// Monthly totals, one entry per calendar month present in the range.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Trend {
    pub labels: Vec<String>,
    pub electricity: Vec<i64>,
    pub water: Vec<i64>,
    pub cng: Vec<i64>,
    pub air: Vec<i64>,
    pub production: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MonthlyLocation {
    pub label: String,
    pub production: i64,
    pub electricity: i64,
    pub water: i64,
    pub cng: i64,
    pub air: i64,
    pub electricity_per_car: i64,
    pub water_per_car: i64,
    pub cng_per_car: i64,
    pub air_per_car: i64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DailyLocation {
    pub label: String,
    pub production: i64,
    pub electricity: i64,
    pub water: i64,
    pub cng: i64,
    pub air: i64,
    pub electricity_target_per_car: f64,
    pub water_target_per_car: f64,
    pub cng_target_per_car: f64,
    pub air_target_per_car: f64,
    pub electricity_actual_per_car: f64,
    pub water_actual_per_car: f64,
    pub cng_actual_per_car: f64,
    pub air_actual_per_car: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Location {
    Monthly(MonthlyLocation),
    Daily(DailyLocation),
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Overview {
    pub summary: Summary,
    pub per_car: PerCar,
    pub trend: Trend,
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Default)]
struct MonthTotals {
    electricity: f64,
    water: f64,
    cng: f64,
    air: f64,
    production: f64,
}

impl MonthTotals {
    fn add(&mut self, r: &ConsumptionRecord) {
        self.electricity += r.electricity_kwh;
        self.water += r.water_m3;
        self.cng += r.cng_scm;
        self.air += r.air_m3;
        self.production += r.production_count as f64;
    }
}

fn month_label(year: i32, month: u8) -> String {
    format!("{} {}", MONTH_ABBR[usize::from(month) - 1], year)
}

/// `"1 Jan"` style label for a `YYYY-MM-DD` date.
pub(crate) fn day_label(date: &str) -> String {
    match crate::domain::parse_day(date) {
        Some(d) => format!("{} {}", d.day(), MONTH_ABBR[usize::from(u8::from(d.month())) - 1]),
        None => date.to_string(),
    }
}

/// Build the dashboard overview for the records between `from` and `to`.
///
/// Rows whose year falls outside `years` are ignored.
pub fn overview(rows: &[ConsumptionRecord], from: Date, to: Date, years: YearRange) -> Overview {
    let rows: Vec<&ConsumptionRecord> = rows
        .iter()
        .filter(|r| r.year().is_some_and(|y| years.contains(y)))
        .collect();

    if rows.is_empty() {
        return Overview::default();
    }

    let mut totals = MonthTotals::default();
    for r in &rows {
        totals.add(r);
    }
    let summary = Summary {
        electricity: round_i(totals.electricity),
        water: round_i(totals.water),
        cng: round_i(totals.cng),
        air: round_i(totals.air),
        production: round_i(totals.production),
    };

    // Ratios only over days that produced something.
    let mut producing = MonthTotals::default();
    for r in rows.iter().filter(|r| r.production_count > 0) {
        producing.add(r);
    }
    let per_car_summary = if producing.production > 0.0 {
        PerCar {
            electricity: round2(per_car(producing.electricity, producing.production)),
            water: round2(per_car(producing.water, producing.production)),
            cng: round2(per_car(producing.cng, producing.production)),
            air: round2(per_car(producing.air, producing.production)),
        }
    } else {
        PerCar::default()
    };

    let mut monthly: BTreeMap<(i32, u8), MonthTotals> = BTreeMap::new();
    for r in &rows {
        if let Some(day) = r.day() {
            monthly
                .entry((day.year(), u8::from(day.month())))
                .or_default()
                .add(r);
        }
    }

    let mut trend = Trend::default();
    for (&(year, month), m) in &monthly {
        trend.labels.push(month_label(year, month));
        trend.electricity.push(round_i(m.electricity));
        trend.water.push(round_i(m.water));
        trend.cng.push(round_i(m.cng));
        trend.air.push(round_i(m.air));
        trend.production.push(round_i(m.production));
    }

    let locations = if (to - from).whole_days() > DAILY_TABLE_MAX_DAYS {
        monthly
            .iter()
            .map(|(&(year, month), m)| {
                let ratio = |total: f64| round_i(per_car(total, m.production));
                Location::Monthly(MonthlyLocation {
                    label: month_label(year, month),
                    production: round_i(m.production),
                    electricity: round_i(m.electricity),
                    water: round_i(m.water),
                    cng: round_i(m.cng),
                    air: round_i(m.air),
                    electricity_per_car: ratio(m.electricity),
                    water_per_car: ratio(m.water),
                    cng_per_car: ratio(m.cng),
                    air_per_car: ratio(m.air),
                })
            })
            .collect()
    } else {
        rows.iter()
            .map(|r| {
                let produced = r.production_count as f64;
                Location::Daily(DailyLocation {
                    label: day_label(&r.date),
                    production: r.production_count,
                    electricity: round_i(r.electricity_kwh),
                    water: round_i(r.water_m3),
                    cng: round_i(r.cng_scm),
                    air: round_i(r.air_m3),
                    electricity_target_per_car: r.electricity_target_per_car,
                    water_target_per_car: r.water_target_per_car,
                    cng_target_per_car: r.cng_target_per_car,
                    air_target_per_car: r.air_target_per_car,
                    electricity_actual_per_car: round2(per_car(r.electricity_kwh, produced)),
                    water_actual_per_car: round2(per_car(r.water_m3, produced)),
                    cng_actual_per_car: round2(per_car(r.cng_scm, produced)),
                    air_actual_per_car: round2(per_car(r.air_m3, produced)),
                })
            })
            .collect()
    };

    Overview {
        summary,
        per_car: per_car_summary,
        trend,
        locations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn record(date: &str, cars: i64, kwh: f64, water: f64) -> ConsumptionRecord {
        ConsumptionRecord {
            production_count: cars,
            electricity_kwh: kwh,
            water_m3: water,
            electricity_target_per_car: 9.5,
            ..ConsumptionRecord::empty(date)
        }
    }

    #[test]
    fn empty_range_yields_zeroed_overview() {
        let o = overview(&[], date!(2024-01-01), date!(2024-01-31), YearRange::default());
        assert_eq!(o, Overview::default());
    }

    #[test]
    fn per_car_ignores_idle_days() {
        let rows = vec![
            record("2024-01-01", 100, 1000.0, 50.0),
            record("2024-01-02", 0, 400.0, 10.0),
            record("2024-01-03", 100, 1000.0, 50.0),
        ];
        let o = overview(&rows, date!(2024-01-01), date!(2024-01-03), YearRange::default());

        assert_eq!(o.summary.electricity, 2400);
        assert_eq!(o.summary.production, 200);
        assert_eq!(o.per_car.electricity, 10.0);
        assert_eq!(o.per_car.water, 0.5);
    }

    #[test]
    fn short_ranges_list_days() {
        let rows = vec![record("2024-01-05", 3, 100.0, 1.0)];
        let o = overview(&rows, date!(2024-01-01), date!(2024-01-31), YearRange::default());

        assert_eq!(o.trend.labels, vec!["Jan 2024".to_string()]);
        match &o.locations[..] {
            [Location::Daily(d)] => {
                assert_eq!(d.label, "5 Jan");
                assert_eq!(d.electricity_actual_per_car, 33.33);
                assert_eq!(d.electricity_target_per_car, 9.5);
            }
            other => panic!("unexpected locations: {other:?}"),
        }
    }

    #[test]
    fn long_ranges_list_months() {
        let rows = vec![
            record("2024-01-05", 10, 100.0, 1.0),
            record("2024-01-06", 10, 100.0, 1.0),
            record("2024-02-01", 0, 50.0, 1.0),
        ];
        let o = overview(&rows, date!(2024-01-01), date!(2024-03-31), YearRange::default());

        assert_eq!(o.locations.len(), 2);
        match &o.locations[0] {
            Location::Monthly(m) => {
                assert_eq!(m.label, "Jan 2024");
                assert_eq!(m.production, 20);
                assert_eq!(m.electricity_per_car, 10);
            }
            other => panic!("expected monthly row, got {other:?}"),
        }
        match &o.locations[1] {
            Location::Monthly(m) => assert_eq!(m.electricity_per_car, 0),
            other => panic!("expected monthly row, got {other:?}"),
        }
    }

    #[test]
    fn rows_outside_supported_years_are_dropped() {
        let rows = vec![
            record("2011-12-31", 10, 100.0, 1.0),
            record("2012-01-01", 10, 100.0, 1.0),
        ];
        let o = overview(&rows, date!(2011-12-01), date!(2012-01-31), YearRange::default());
        assert_eq!(o.summary.electricity, 100);
    }
}
