use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

use super::{ApiError, AppState};
use crate::pipeline::{ImportReport, RecordStore};
use crate::sources::load_uploaded;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub report: ImportReport,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: &'static str,
    pub deleted: u64,
}

/// `POST /api/upload`: replace the dataset with the workbook in field `file`.
pub async fn upload_workbook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    metrics::counter!("http_upload_requests_total").increment(1);

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    tracing::info!(file = ?file_name, bytes = bytes.len(), "workbook upload received");

    let workbook = tokio::task::spawn_blocking(move || load_uploaded(file_name.as_deref(), bytes.to_vec()))
        .await
        .map_err(|e| ApiError::Internal(format!("workbook reader panicked: {e}")))??;

    let coordinator = state.coordinator.lock().await;
    let report = coordinator.import_workbook(&workbook).await?;

    Ok(Json(UploadResponse {
        message: "Excel imported successfully",
        report,
    }))
}

/// `DELETE /api/upload/clear`
pub async fn clear_all(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let _guard = state.coordinator.lock().await;
    let deleted = state.store.clear_all().await?;
    tracing::info!(deleted, "cleared all consumption records");

    Ok(Json(ClearResponse {
        message: "All data cleared",
        deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{record, state_with};
    use crate::pipeline::{DuplicatePolicy, ImportBatch, SkipReason};
    use crate::sources::spreadsheet::fixtures::plant_workbook;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header, Request},
    };

    const BOUNDARY: &str = "consumption-upload-boundary";

    fn multipart_request(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .expect("request")
    }

    async fn upload(state: &AppState, req: Request<Body>) -> Result<Json<UploadResponse>, ApiError> {
        let multipart = Multipart::from_request(req, state).await.expect("multipart");
        upload_workbook(State(state.clone()), multipart).await
    }

    #[tokio::test]
    async fn xlsx_upload_replaces_the_dataset() {
        let state = state_with(vec![record("2019-06-01", 5, 5.0, 0.0)]).await;
        let bytes = plant_workbook().expect("build xlsx");

        let Json(resp) = upload(&state, multipart_request("file", "plant.xlsx", &bytes))
            .await
            .expect("upload");

        let report = &resp.report;
        assert_eq!(report.sheets_processed, 1);
        assert_eq!(report.total_inserted, 1);
        assert_eq!(report.total_skipped, 1);
        assert_eq!(report.skip_reasons.get(&SkipReason::FormulaError), Some(&1));
        assert_eq!(report.by_year.get(&2024), Some(&1));
        assert_eq!(report.sheets.len(), 1);
        assert_eq!(report.sheets[0].name, "G1 2024");
        assert!(report.source_digest.is_some());

        let rows = state
            .store
            .query_by_date_range("2019-01-01", "2024-12-31")
            .await
            .expect("query");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "2024-03-15");
        assert_eq!(rows[0].production_count, 120);
        assert_eq!(rows[0].electricity_kwh, 1500.0);
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let state = state_with(Vec::new()).await;
        let res = upload(&state, multipart_request("attachment", "plant.xlsx", b"x")).await;
        assert!(matches!(res, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn clear_reports_deleted_count() {
        let state = state_with(vec![
            record("2024-01-01", 1, 1.0, 0.0),
            record("2024-01-02", 1, 1.0, 0.0),
        ])
        .await;

        let Json(resp) = clear_all(State(state.clone())).await.expect("clear");
        assert_eq!(resp.deleted, 2);
        assert_eq!(state.store.date_bounds().await.expect("bounds"), (None, None));
    }

    #[test]
    fn upload_response_flattens_report() {
        let batch = ImportBatch::new(DuplicatePolicy::FirstWins);
        let resp = UploadResponse {
            message: "Excel imported successfully",
            report: ImportReport::from_batch(&batch, 0, Vec::new(), None),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["message"], "Excel imported successfully");
        assert_eq!(json["sheetsProcessed"], 0);
        assert!(json["byYear"].is_object());
        assert!(json.get("sourceDigest").is_none());
    }
}
