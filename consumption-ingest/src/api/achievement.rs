use axum::{
    extract::{Query, State},
    Json,
};
use consumption_client::analytics::{
    achievement::{ComparisonReport, DailyReport, MonthlyReport},
    comparison_report, daily_report, month_bounds, monthly_report, Metric,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::pipeline::RecordStore;

/// Query string shared by the achievement endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AchievementParams {
    pub year: Option<String>,
    pub month: Option<String>,
    #[serde(rename = "type")]
    pub metric: Option<String>,
}

impl AchievementParams {
    fn year(&self) -> Result<i32, ApiError> {
        parse_param(self.year.as_deref(), "year")
    }

    fn month(&self) -> Result<u8, ApiError> {
        parse_param(self.month.as_deref(), "month")
    }

    fn metric(&self) -> Result<Metric, ApiError> {
        self.metric
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|_| ApiError::BadRequest("Invalid type".to_string()))
    }

    fn require(&self, month: bool) -> Result<(), ApiError> {
        let missing = self.year.is_none() || self.metric.is_none() || (month && self.month.is_none());
        if !missing {
            return Ok(());
        }
        let msg = if month {
            "Missing year, month, or type"
        } else {
            "Missing year or type"
        };
        Err(ApiError::BadRequest(msg.to_string()))
    }
}

fn parse_param<T: std::str::FromStr>(raw: Option<&str>, name: &str) -> Result<T, ApiError> {
    raw.unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {name}")))
}

/// `GET /api/metrics/daily?year&month&type`, `month` zero-based.
pub async fn daily(
    State(state): State<AppState>,
    Query(params): Query<AchievementParams>,
) -> Result<Json<DailyReport>, ApiError> {
    params.require(true)?;
    let (year, month, metric) = (params.year()?, params.month()?, params.metric()?);

    let (from, to) = month
        .checked_add(1)
        .and_then(|m| month_bounds(year, m))
        .ok_or_else(|| ApiError::BadRequest("Invalid month".to_string()))?;
    let rows = state.store.query_by_date_range(&from, &to).await?;

    Ok(Json(daily_report(&rows, year, month, metric)))
}

/// `GET /api/metrics/monthly?year&type`
pub async fn monthly(
    State(state): State<AppState>,
    Query(params): Query<AchievementParams>,
) -> Result<Json<MonthlyReport>, ApiError> {
    params.require(false)?;
    let (year, metric) = (params.year()?, params.metric()?);

    let rows = state
        .store
        .query_by_date_range(&format!("{year:04}-01-01"), &format!("{year:04}-12-31"))
        .await?;

    Ok(Json(monthly_report(&rows, year, metric)))
}

/// `GET /api/metrics/comparison?year&month&type`, `month` one-based.
pub async fn comparison(
    State(state): State<AppState>,
    Query(params): Query<AchievementParams>,
) -> Result<Json<ComparisonReport>, ApiError> {
    params.require(true)?;
    let (year, month, metric) = (params.year()?, params.month()?, params.metric()?);

    let (from, to) =
        month_bounds(year, month).ok_or_else(|| ApiError::BadRequest("Invalid month".to_string()))?;
    let rows = state.store.query_by_date_range(&from, &to).await?;

    Ok(Json(comparison_report(&rows, year, month, metric)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{record, state_with};

    fn params(year: Option<&str>, month: Option<&str>, metric: Option<&str>) -> AchievementParams {
        AchievementParams {
            year: year.map(str::to_string),
            month: month.map(str::to_string),
            metric: metric.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn missing_and_invalid_params_are_bad_requests() {
        let state = state_with(Vec::new()).await;

        let res = daily(State(state.clone()), Query(params(Some("2024"), None, Some("water")))).await;
        assert!(matches!(res, Err(ApiError::BadRequest(m)) if m == "Missing year, month, or type"));

        let res = monthly(State(state.clone()), Query(params(Some("2024"), None, Some("steam")))).await;
        assert!(matches!(res, Err(ApiError::BadRequest(m)) if m == "Invalid type"));

        let res = comparison(State(state), Query(params(Some("2024"), Some("13"), Some("cng")))).await;
        assert!(matches!(res, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn daily_month_is_zero_based() {
        let state = state_with(vec![
            record("2024-01-31", 10, 100.0, 12.0),
            record("2024-02-01", 10, 50.0, 10.0),
            record("2024-02-02", 0, 50.0, 10.0),
        ])
        .await;

        let Json(report) = daily(State(state), Query(params(Some("2024"), Some("1"), Some("electricity"))))
            .await
            .expect("daily report");
        assert_eq!(report.daily.len(), 2);
        assert_eq!(report.daily[0].date, "2024-02-01");
        assert_eq!(report.daily[0].achieved_percent, 50);
        assert_eq!(report.daily[1].achieved_percent, 0);
    }

    #[tokio::test]
    async fn comparison_month_is_one_based() {
        let state = state_with(vec![
            record("2024-01-31", 10, 100.0, 12.0),
            record("2024-02-01", 10, 50.0, 10.0),
        ])
        .await;

        let Json(report) = comparison(State(state), Query(params(Some("2024"), Some("1"), Some("electricity"))))
            .await
            .expect("comparison report");
        assert_eq!(report.data.len(), 1);
        assert_eq!(report.data[0].date, "2024-01-31");
    }

    #[tokio::test]
    async fn monthly_returns_twelve_buckets() {
        let state = state_with(vec![record("2024-03-10", 4, 8.0, 1.0)]).await;
        let Json(report) = monthly(State(state), Query(params(Some("2024"), None, Some("electricity"))))
            .await
            .expect("monthly report");
        assert_eq!(report.monthly.len(), 12);
    }
}
