use axum::{
    extract::{Query, State},
    Json,
};
use consumption_client::{
    analytics::{self, Overview},
    domain::{format_day, parse_day},
};
use serde::{Deserialize, Serialize};
use time::Date;

use super::{ApiError, AppState};
use crate::pipeline::RecordStore;

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub min_date: Option<String>,
    pub max_date: Option<String>,
}

/// Accepts `YYYY-MM-DD` or the browser's `MM/DD/YYYY`.
pub fn parse_input_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    let bytes = raw.as_bytes();

    if bytes.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        return parse_day(raw);
    }

    if bytes.len() == 10 && bytes[2] == b'/' && bytes[5] == b'/' {
        let (month, day, year) = (&raw[0..2], &raw[3..5], &raw[6..10]);
        return parse_day(&format!("{year}-{month}-{day}"));
    }

    None
}

/// `GET /api/consumption?from&to`
pub async fn overview(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Overview>, ApiError> {
    let parse = |v: &Option<String>| v.as_deref().and_then(parse_input_date);
    let (Some(from), Some(to)) = (parse(&params.from), parse(&params.to)) else {
        return Err(ApiError::BadRequest("Invalid date format".to_string()));
    };

    let rows = state
        .store
        .query_by_date_range(&format_day(from), &format_day(to))
        .await?;
    tracing::debug!(%from, %to, rows = rows.len(), "building overview");

    Ok(Json(analytics::overview(&rows, from, to, state.years)))
}

/// `GET /api/consumption/date-range`
pub async fn date_range(State(state): State<AppState>) -> Result<Json<DateRange>, ApiError> {
    let (min_date, max_date) = state.store.date_bounds().await?;
    Ok(Json(DateRange { min_date, max_date }))
}
