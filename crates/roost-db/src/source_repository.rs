use roost_core::error::AppError;
use roost_core::source::{ScrapePolicy, SourceConfig, SourceKind};
use roost_core::traits::SourceBackend;
use sqlx::{PgPool, Pool, Postgres};

/// Source configuration store in PostgreSQL.
///
/// The tagged `kind` union and the scrape policy are stored as JSONB, so
/// adding a source kind is a code change, not a schema migration.
#[derive(Clone)]
pub struct SourceRepository {
    pool: Pool<Postgres>,
}

impl SourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: String,
    name: String,
    kind: serde_json::Value,
    enabled: bool,
    priority: i32,
    policy: serde_json::Value,
}

impl TryFrom<SourceRow> for SourceConfig {
    type Error = AppError;

    fn try_from(row: SourceRow) -> Result<Self, AppError> {
        let kind: SourceKind = serde_json::from_value(row.kind).map_err(|e| {
            AppError::DatabaseError(format!("source '{}' has invalid kind: {e}", row.id))
        })?;
        let policy: ScrapePolicy = serde_json::from_value(row.policy).map_err(|e| {
            AppError::DatabaseError(format!("source '{}' has invalid policy: {e}", row.id))
        })?;
        Ok(SourceConfig {
            id: row.id,
            name: row.name,
            kind,
            enabled: row.enabled,
            priority: row.priority,
            policy,
        })
    }
}

impl SourceBackend for SourceRepository {
    async fn get_source(&self, id: &str) -> Result<Option<SourceConfig>, AppError> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"SELECT id, name, kind, enabled, priority, policy FROM sources WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_sources(&self, enabled_only: bool) -> Result<Vec<SourceConfig>, AppError> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, name, kind, enabled, priority, policy FROM sources
            WHERE NOT $1 OR enabled
            ORDER BY priority ASC, id ASC
            "#,
        )
        .bind(enabled_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn upsert_source(&self, config: &SourceConfig) -> Result<(), AppError> {
        let kind = serde_json::to_value(&config.kind)?;
        let policy = serde_json::to_value(&config.policy)?;

        sqlx::query(
            r#"
            INSERT INTO sources (id, name, kind, enabled, priority, policy)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                kind = EXCLUDED.kind,
                enabled = EXCLUDED.enabled,
                priority = EXCLUDED.priority,
                policy = EXCLUDED.policy,
                updated_at = NOW()
            "#,
        )
        .bind(&config.id)
        .bind(&config.name)
        .bind(kind)
        .bind(config.enabled)
        .bind(config.priority)
        .bind(policy)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
