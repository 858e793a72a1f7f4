//! HTTP surface: workbook upload, dataset overview and achievement reports.

pub mod achievement;
pub mod consumption;
pub mod upload;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use consumption_client::domain::YearRange;
use serde_json::json;
use tokio::sync::Mutex;

use crate::pipeline::{ImportCoordinator, PipelineError, RecordStore};

pub type SharedStore = Arc<dyn RecordStore>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    /// Uploads run one at a time; the lock is held for the whole import.
    pub coordinator: Arc<Mutex<ImportCoordinator<SharedStore>>>,
    pub years: YearRange,
}

impl AppState {
    pub fn new(coordinator: ImportCoordinator<SharedStore>) -> Self {
        Self {
            store: coordinator.store().clone(),
            years: coordinator.settings().years,
            coordinator: Arc::new(Mutex::new(coordinator)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::Workbook(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Pipeline(PipelineError::Transform(_)) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::Store(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload", post(upload::upload_workbook))
        .route("/api/upload/clear", delete(upload::clear_all))
        .route("/api/consumption", get(consumption::overview))
        .route("/api/consumption/date-range", get(consumption::date_range))
        .route("/api/metrics/daily", get(achievement::daily))
        .route("/api/metrics/monthly", get(achievement::monthly))
        .route("/api/metrics/comparison", get(achievement::comparison))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr {bind_addr}: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "consumption API listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
