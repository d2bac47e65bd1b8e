use chrono::{DateTime, Utc};
use roost_core::error::AppError;
use roost_core::health::SourceHealthMetric;
use roost_core::traits::HealthBackend;
use sqlx::{PgPool, Pool, Postgres};

/// Append-only health-metric history in PostgreSQL.
#[derive(Clone)]
pub struct HealthRepository {
    pool: Pool<Postgres>,
}

impl HealthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct MetricRow {
    source_id: String,
    recorded_at: DateTime<Utc>,
    fetch_attempts: i32,
    fetch_successes: i32,
    fetch_failures: i32,
    listings_found: i32,
    new_listings: i32,
    delisted_listings: i32,
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
}

impl From<MetricRow> for SourceHealthMetric {
    fn from(row: MetricRow) -> Self {
        SourceHealthMetric {
            source_id: row.source_id,
            recorded_at: row.recorded_at,
            fetch_attempts: row.fetch_attempts as u32,
            fetch_successes: row.fetch_successes as u32,
            fetch_failures: row.fetch_failures as u32,
            listings_found: row.listings_found as u32,
            new_listings: row.new_listings as u32,
            delisted_listings: row.delisted_listings as u32,
            last_error: row.last_error,
            last_error_at: row.last_error_at,
        }
    }
}

const METRIC_COLUMNS: &str = r#"
    source_id, recorded_at, fetch_attempts, fetch_successes, fetch_failures,
    listings_found, new_listings, delisted_listings, last_error, last_error_at
"#;

impl HealthBackend for HealthRepository {
    async fn append_metric(&self, metric: &SourceHealthMetric) -> Result<(), AppError> {
        let sql = format!(
            r#"
            INSERT INTO source_health_metrics ({METRIC_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#
        );
        sqlx::query(&sql)
            .bind(&metric.source_id)
            .bind(metric.recorded_at)
            .bind(metric.fetch_attempts as i32)
            .bind(metric.fetch_successes as i32)
            .bind(metric.fetch_failures as i32)
            .bind(metric.listings_found as i32)
            .bind(metric.new_listings as i32)
            .bind(metric.delisted_listings as i32)
            .bind(&metric.last_error)
            .bind(metric.last_error_at)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn latest_metric(
        &self,
        source_id: &str,
    ) -> Result<Option<SourceHealthMetric>, AppError> {
        let sql = format!(
            r#"
            SELECT {METRIC_COLUMNS} FROM source_health_metrics
            WHERE source_id = $1
            ORDER BY recorded_at DESC
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, MetricRow>(&sql)
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn read_metrics(
        &self,
        source_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceHealthMetric>, AppError> {
        let rows = if let Some(source_id) = source_id {
            let sql = format!(
                r#"
                SELECT {METRIC_COLUMNS} FROM source_health_metrics
                WHERE source_id = $1
                ORDER BY recorded_at DESC
                LIMIT $2
                "#
            );
            sqlx::query_as::<_, MetricRow>(&sql)
                .bind(source_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
        } else {
            let sql = format!(
                r#"
                SELECT {METRIC_COLUMNS} FROM source_health_metrics
                ORDER BY recorded_at DESC
                LIMIT $1
                "#
            );
            sqlx::query_as::<_, MetricRow>(&sql)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
