use std::{sync::Arc, time::Duration};

use anyhow::Result;
use consumption_client::db::consumption_queries;
use consumption_ingest::{
    api::{self, AppState, SharedStore},
    config::AppConfig,
    metrics_server, observability,
    pipeline::ImportCoordinator,
    sinks::PgRecordStore,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing()?;

    let cfg = AppConfig::load()?;
    let settings = cfg.import.settings()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    consumption_queries::ensure_schema(&pool).await?;

    let store: SharedStore = Arc::new(PgRecordStore::new(
        pool,
        cfg.store.batch_size,
        cfg.store.max_retries,
        Duration::from_millis(cfg.store.retry_backoff_ms),
    ));

    tracing::info!(
        min_year = settings.years.min,
        max_year = settings.years.max,
        date_order = ?settings.date_order,
        duplicate_policy = ?settings.duplicate_policy,
        "import settings loaded"
    );

    let state = AppState::new(ImportCoordinator::new(store, settings));
    let app = api::router(state, cfg.http.max_upload_bytes);

    api::serve(&cfg.http.bind_addr, app).await
}
