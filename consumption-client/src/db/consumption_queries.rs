use anyhow::Result;
use sqlx::PgPool;

use crate::domain::ConsumptionRecord;

/// Create the `consumption` table if missing and add any columns introduced
/// after the first schema. Changes are additive only.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consumption (
            "date"           TEXT PRIMARY KEY,
            production_count BIGINT NOT NULL DEFAULT 0,
            electricity_kwh  DOUBLE PRECISION NOT NULL DEFAULT 0,
            cng_scm          DOUBLE PRECISION NOT NULL DEFAULT 0,
            water_m3         DOUBLE PRECISION NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    for column in [
        "air_m3",
        "electricity_target_per_car",
        "water_target_per_car",
        "cng_target_per_car",
        "air_target_per_car",
    ] {
        let sql = format!(
            "ALTER TABLE consumption ADD COLUMN IF NOT EXISTS {column} DOUBLE PRECISION DEFAULT 0"
        );
        sqlx::query(&sql).execute(pool).await?;
    }

    Ok(())
}

/// Fetch every record with `from <= date <= to`, oldest first.
///
/// Both bounds are canonical `YYYY-MM-DD` strings; columns added after the
/// first schema may be NULL on old rows and are read back as zero.
pub async fn fetch_range(pool: &PgPool, from: &str, to: &str) -> Result<Vec<ConsumptionRecord>> {
    let rows = sqlx::query_as::<_, ConsumptionRecord>(
        r#"
        SELECT
            "date",
            production_count,
            electricity_kwh,
            water_m3,
            cng_scm,
            COALESCE(air_m3, 0)                     AS air_m3,
            COALESCE(electricity_target_per_car, 0) AS electricity_target_per_car,
            COALESCE(water_target_per_car, 0)       AS water_target_per_car,
            COALESCE(cng_target_per_car, 0)         AS cng_target_per_car,
            COALESCE(air_target_per_car, 0)         AS air_target_per_car
        FROM consumption
        WHERE "date" >= $1
          AND "date" <= $2
        ORDER BY "date"
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Earliest and latest stored dates, `None` when the table is empty.
pub async fn date_bounds(pool: &PgPool) -> Result<(Option<String>, Option<String>)> {
    let bounds: (Option<String>, Option<String>) =
        sqlx::query_as(r#"SELECT MIN("date"), MAX("date") FROM consumption"#)
            .fetch_one(pool)
            .await?;

    Ok(bounds)
}

/// Delete every record, returning how many rows were removed.
pub async fn clear_all(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM consumption").execute(pool).await?;
    Ok(result.rows_affected())
}
