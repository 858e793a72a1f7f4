pub mod consumption;

pub use consumption::{format_day, parse_day, ConsumptionRecord, YearRange};
