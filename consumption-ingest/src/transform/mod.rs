pub mod columns;
pub mod date;
pub mod sanitize;
pub mod year;

use consumption_client::domain::{ConsumptionRecord, YearRange};

use crate::pipeline::PipelineError;

/// Pure validation of a canonical `ConsumptionRecord`.
///
/// Rules:
/// - date must be a real `YYYY-MM-DD` day inside `years`.
/// - production and every reading must be finite and non-negative.
pub fn validate_record(r: &ConsumptionRecord, years: YearRange) -> Result<(), PipelineError> {
    let result = check_record(r, years);
    if result.is_err() {
        metrics::counter!("validation_consumption_rejected_total").increment(1);
    }
    result
}

fn check_record(r: &ConsumptionRecord, years: YearRange) -> Result<(), PipelineError> {
    let day = r
        .day()
        .ok_or_else(|| PipelineError::Transform(format!("date {:?} is not YYYY-MM-DD", r.date)))?;

    if !years.contains(day.year()) {
        return Err(PipelineError::Transform(format!(
            "year {} outside {}..={}",
            day.year(),
            years.min,
            years.max
        )));
    }

    if r.production_count < 0 {
        return Err(PipelineError::Transform("production must be non-negative".to_string()));
    }

    let readings = [
        ("electricity_kwh", r.electricity_kwh),
        ("water_m3", r.water_m3),
        ("cng_scm", r.cng_scm),
        ("air_m3", r.air_m3),
        ("electricity_target_per_car", r.electricity_target_per_car),
        ("water_target_per_car", r.water_target_per_car),
        ("cng_target_per_car", r.cng_target_per_car),
        ("air_target_per_car", r.air_target_per_car),
    ];
    if let Some((name, _)) = readings.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
        return Err(PipelineError::Transform(format!("{name} must be finite and non-negative")));
    }

    Ok(())
}
