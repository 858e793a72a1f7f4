//! Query-side aggregation over stored [`ConsumptionRecord`]s.
//!
//! Everything here is pure arithmetic over rows already fetched from the
//! store; callers decide which date range to load.

pub mod achievement;
pub mod overview;

use std::{fmt, str::FromStr};

use crate::domain::ConsumptionRecord;

pub use achievement::{comparison_report, daily_report, month_bounds, monthly_report};
pub use overview::{overview, Overview};

pub(crate) const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// The quantity a report is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Metric {
    Electricity,
    Water,
    Cng,
    Air,
    Production,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown metric type '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "electricity" => Ok(Self::Electricity),
            "water" => Ok(Self::Water),
            "cng" => Ok(Self::Cng),
            "air" => Ok(Self::Air),
            "production" => Ok(Self::Production),
            other => Err(UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Electricity => "electricity",
            Self::Water => "water",
            Self::Cng => "cng",
            Self::Air => "air",
            Self::Production => "production",
        };
        f.write_str(name)
    }
}

impl Metric {
    pub fn unit(self) -> &'static str {
        match self {
            Self::Electricity => "kWh",
            Self::Water | Self::Air => "m³",
            Self::Cng => "SCM",
            Self::Production => "Cars",
        }
    }

    /// The day's measured value for this metric.
    pub fn actual(self, r: &ConsumptionRecord) -> f64 {
        match self {
            Self::Electricity => r.electricity_kwh,
            Self::Water => r.water_m3,
            Self::Cng => r.cng_scm,
            Self::Air => r.air_m3,
            Self::Production => r.production_count as f64,
        }
    }

    /// The day's per-car target; production has none.
    pub fn target(self, r: &ConsumptionRecord) -> Option<f64> {
        match self {
            Self::Electricity => Some(r.electricity_target_per_car),
            Self::Water => Some(r.water_target_per_car),
            Self::Cng => Some(r.cng_target_per_car),
            Self::Air => Some(r.air_target_per_car),
            Self::Production => None,
        }
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round_i(v: f64) -> i64 {
    v.round() as i64
}

/// Ratio of consumption to cars produced; zero when nothing was produced.
pub fn per_car(total: f64, production: f64) -> f64 {
    if production > 0.0 {
        total / production
    } else {
        0.0
    }
}

/// Actual-per-car as a whole percentage of the target; zero without a target.
pub fn achieved_percent(actual_per_car: f64, target: f64) -> i64 {
    if target > 0.0 {
        round_i(actual_per_car / target * 100.0)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_parses_known_names_only() {
        assert_eq!("cng".parse::<Metric>(), Ok(Metric::Cng));
        assert_eq!("production".parse::<Metric>(), Ok(Metric::Production));
        assert_eq!(
            "steam".parse::<Metric>(),
            Err(UnknownMetric("steam".to_string()))
        );
    }

    #[test]
    fn production_has_no_target() {
        let r = ConsumptionRecord::empty("2024-01-01");
        assert_eq!(Metric::Production.target(&r), None);
        assert_eq!(Metric::Water.target(&r), Some(0.0));
    }

    #[test]
    fn achievement_is_zero_without_target() {
        assert_eq!(achieved_percent(12.0, 0.0), 0);
        assert_eq!(achieved_percent(12.0, 10.0), 120);
        assert_eq!(per_car(100.0, 0.0), 0.0);
        assert_eq!(round2(per_car(100.0, 3.0)), 33.33);
    }
}
