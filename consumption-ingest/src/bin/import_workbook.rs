use anyhow::{bail, Result};
use consumption_client::db::consumption_queries;
use consumption_ingest::{
    config::{AppConfig, ImportConfig},
    observability,
    pipeline::ImportCoordinator,
    sinks::{MemoryRecordStore, PgRecordStore},
    sources::source_for_path,
};
use sqlx::postgres::PgPoolOptions;
use std::{env, path::PathBuf, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing()?;

    let mut path = None;
    let mut dry_run = false;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument {arg}"),
        }
    }
    let Some(path) = path else {
        bail!("usage: import_workbook <workbook.xlsx|.csv> [--dry-run]");
    };

    let source = source_for_path(&path);
    let workbook = tokio::task::spawn_blocking(move || source.load()).await??;
    tracing::info!(path = %path.display(), sheets = ?workbook.sheet_names(), "workbook loaded");

    let report = if dry_run {
        // Without a config file the defaults apply; nothing is written.
        let import_cfg = AppConfig::load().map(|c| c.import).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "no usable config, using default import settings");
            ImportConfig::default()
        });
        let coordinator = ImportCoordinator::new(MemoryRecordStore::default(), import_cfg.settings()?);
        coordinator.import_workbook(&workbook).await?
    } else {
        let cfg = AppConfig::load()?;
        let pool = PgPoolOptions::new()
            .max_connections(cfg.database.max_connections)
            .connect(&cfg.database.uri)
            .await?;
        consumption_queries::ensure_schema(&pool).await?;

        let store = PgRecordStore::new(
            pool,
            cfg.store.batch_size,
            cfg.store.max_retries,
            Duration::from_millis(cfg.store.retry_backoff_ms),
        );
        let coordinator = ImportCoordinator::new(store, cfg.import.settings()?);
        coordinator.import_workbook(&workbook).await?
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
