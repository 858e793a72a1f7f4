use std::time::Duration;

use consumption_client::{db::consumption_queries, domain::ConsumptionRecord};
use sqlx::{postgres::PgPool, Postgres, QueryBuilder};

use crate::pipeline::{PipelineError, RecordStore};

/// `RecordStore` over the PostgreSQL `consumption` table.
///
/// Inserts are written in chunks of `batch_size`; a failed chunk is retried
/// with linear backoff before the error is surfaced.
pub struct PgRecordStore {
    pool: PgPool,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, batch_size: usize, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
            max_retries,
            retry_backoff,
        }
    }

    async fn flush_batch(&self, batch: &[ConsumptionRecord]) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut attempt: u32 = 0;
        loop {
            match self.insert_batch(batch).await {
                Ok(()) => {
                    metrics::counter!("consumption_store_written_total").increment(batch.len() as u64);
                    return Ok(());
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "consumption insert failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "consumption insert failed, giving up");
                    metrics::counter!("consumption_store_errors_total").increment(1);
                    return Err(PipelineError::Store(e.to_string()));
                }
            }
        }
    }

    async fn insert_batch(&self, batch: &[ConsumptionRecord]) -> Result<(), sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO consumption (\"date\", production_count, electricity_kwh, water_m3, cng_scm, air_m3, \
             electricity_target_per_car, water_target_per_car, cng_target_per_car, air_target_per_car) ",
        );

        builder.push_values(batch, |mut b, r| {
            b.push_bind(&r.date)
                .push_bind(r.production_count)
                .push_bind(r.electricity_kwh)
                .push_bind(r.water_m3)
                .push_bind(r.cng_scm)
                .push_bind(r.air_m3)
                .push_bind(r.electricity_target_per_car)
                .push_bind(r.water_target_per_car)
                .push_bind(r.cng_target_per_car)
                .push_bind(r.air_target_per_car);
        });

        builder.build().execute(&self.pool).await.map(|_| ())
    }
}

fn store_error(e: anyhow::Error) -> PipelineError {
    metrics::counter!("consumption_store_errors_total").increment(1);
    PipelineError::Store(e.to_string())
}

#[async_trait::async_trait]
impl RecordStore for PgRecordStore {
    async fn clear_all(&self) -> Result<u64, PipelineError> {
        consumption_queries::clear_all(&self.pool).await.map_err(store_error)
    }

    async fn insert(&self, records: &[ConsumptionRecord]) -> Result<(), PipelineError> {
        for chunk in records.chunks(self.batch_size) {
            self.flush_batch(chunk).await?;
        }
        Ok(())
    }

    async fn query_by_date_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<ConsumptionRecord>, PipelineError> {
        consumption_queries::fetch_range(&self.pool, from, to)
            .await
            .map_err(store_error)
    }

    async fn date_bounds(&self) -> Result<(Option<String>, Option<String>), PipelineError> {
        consumption_queries::date_bounds(&self.pool).await.map_err(store_error)
    }
}
