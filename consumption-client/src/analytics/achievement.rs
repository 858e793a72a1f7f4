use time::Month;

use super::{achieved_percent, overview::day_label, per_car, round2, round_i, Metric, MONTH_ABBR};
use crate::domain::ConsumptionRecord;

/// First and last `YYYY-MM-DD` of a month (`month` is 1-based).
pub fn month_bounds(year: i32, month: u8) -> Option<(String, String)> {
    let m = Month::try_from(month).ok()?;
    let last = m.length(year);
    Some((
        format!("{year:04}-{month:02}-01"),
        format!("{year:04}-{month:02}-{last:02}"),
    ))
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DailyAchievement {
    pub date: String,
    pub label: String,
    pub actual: i64,
    pub actual_per_car: f64,
    pub target: Option<i64>,
    pub achieved_percent: i64,
    pub production: i64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MonthRollup {
    pub total_actual: i64,
    pub total_production: i64,
    pub avg_per_car: f64,
    pub avg_target: i64,
    pub achieved_percent: i64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DailyReport {
    pub year: i32,
    /// Zero-based month, as the dashboard sends it.
    pub month: u8,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub metric: Metric,
    pub unit: &'static str,
    pub daily: Vec<DailyAchievement>,
    pub monthly: MonthRollup,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MonthBucket {
    pub month: &'static str,
    pub total_actual: i64,
    pub total_production: i64,
    pub avg_per_car: f64,
    pub avg_target: i64,
    pub achieved_percent: i64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MonthlyReport {
    pub year: i32,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub metric: Metric,
    pub unit: &'static str,
    pub monthly: Vec<MonthBucket>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ComparisonRow {
    pub date: String,
    pub actual: i64,
    pub actual_per_car: f64,
    pub target: Option<i64>,
    pub achieved_percent: i64,
    pub production: i64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ComparisonReport {
    pub year: i32,
    /// One-based month.
    pub month: u8,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub metric: Metric,
    pub data: Vec<ComparisonRow>,
}

/// A day's actual vs. target; a zero target is reported as no target.
fn compare(r: &ConsumptionRecord, metric: Metric) -> ComparisonRow {
    let actual = metric.actual(r);
    let actual_per_car = per_car(actual, r.production_count as f64);
    let target = metric.target(r).filter(|t| *t > 0.0);

    ComparisonRow {
        date: r.date.clone(),
        actual: round_i(actual),
        actual_per_car: round2(actual_per_car),
        target: target.map(round_i),
        achieved_percent: target.map_or(0, |t| achieved_percent(actual_per_car, t)),
        production: r.production_count,
    }
}

/// Per-day achievement for one month plus a month roll-up.
///
/// `rows` should already be limited to the month; `month` is zero-based.
pub fn daily_report(rows: &[ConsumptionRecord], year: i32, month: u8, metric: Metric) -> DailyReport {
    let daily: Vec<DailyAchievement> = rows
        .iter()
        .map(|r| {
            let c = compare(r, metric);
            DailyAchievement {
                label: day_label(&c.date),
                date: c.date,
                actual: c.actual,
                actual_per_car: c.actual_per_car,
                target: c.target,
                achieved_percent: c.achieved_percent,
                production: c.production,
            }
        })
        .collect();

    let total_actual: i64 = daily.iter().map(|d| d.actual).sum();
    let total_production: i64 = daily.iter().map(|d| d.production).sum();
    let avg_per_car = per_car(total_actual as f64, total_production as f64);
    let avg_target = if daily.is_empty() {
        0.0
    } else {
        daily.iter().map(|d| d.target.unwrap_or(0) as f64).sum::<f64>() / daily.len() as f64
    };

    DailyReport {
        year,
        month,
        metric,
        unit: metric.unit(),
        monthly: MonthRollup {
            total_actual,
            total_production,
            avg_per_car: round2(avg_per_car),
            avg_target: round_i(avg_target),
            achieved_percent: achieved_percent(avg_per_car, avg_target),
        },
        daily,
    }
}

/// Twelve month buckets for `year`; months without data are zeroed.
pub fn monthly_report(rows: &[ConsumptionRecord], year: i32, metric: Metric) -> MonthlyReport {
    #[derive(Default, Clone, Copy)]
    struct Acc {
        actual: f64,
        production: i64,
        target: f64,
        days: usize,
    }

    let mut acc = [Acc::default(); 12];
    for r in rows {
        let Some(day) = r.day() else { continue };
        if day.year() != year {
            continue;
        }
        let a = &mut acc[usize::from(u8::from(day.month())) - 1];
        a.actual += metric.actual(r);
        a.production += r.production_count;
        a.target += metric.target(r).unwrap_or(0.0);
        a.days += 1;
    }

    let monthly = acc
        .iter()
        .zip(MONTH_ABBR)
        .map(|(a, month)| {
            let avg_per_car = per_car(a.actual, a.production as f64);
            let avg_target = if a.days > 0 { a.target / a.days as f64 } else { 0.0 };
            MonthBucket {
                month,
                total_actual: round_i(a.actual),
                total_production: a.production,
                avg_per_car: round2(avg_per_car),
                avg_target: round_i(avg_target),
                achieved_percent: achieved_percent(avg_per_car, avg_target),
            }
        })
        .collect();

    MonthlyReport {
        year,
        metric,
        unit: metric.unit(),
        monthly,
    }
}

/// Actual vs. target per day for one month (`month` is one-based).
pub fn comparison_report(rows: &[ConsumptionRecord], year: i32, month: u8, metric: Metric) -> ComparisonReport {
    ComparisonReport {
        year,
        month,
        metric,
        data: rows.iter().map(|r| compare(r, metric)).collect(),
    }
}
