use chrono::{DateTime, Utc};
use roost_core::error::AppError;
use roost_core::listing::{ListingRecord, ListingStatus};
use roost_core::traits::{CanonicalInsert, InsertListing, ListingBackend, SightingUpdate};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Listing persistence in PostgreSQL.
///
/// Every write is a single statement. The canonical slot is guarded by a
/// partial unique index on `canonical_key WHERE NOT is_duplicate`, so two
/// concurrent crawls of different sources can never both insert a
/// canonical record for the same key.
#[derive(Clone)]
pub struct ListingRepository {
    pool: Pool<Postgres>,
}

impl ListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    source_id: String,
    source_listing_id: Option<String>,
    source_url: String,
    street_address: String,
    unit: Option<String>,
    neighborhood: Option<String>,
    borough: Option<String>,
    price: i64,
    beds: f64,
    baths: f64,
    image_urls: serde_json::Value,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    status: String,
    is_duplicate: bool,
    canonical_id: Option<Uuid>,
    canonical_key: String,
}

impl From<ListingRow> for ListingRecord {
    fn from(row: ListingRow) -> Self {
        let image_urls = serde_json::from_value(row.image_urls).unwrap_or_default();
        ListingRecord {
            id: row.id,
            source_id: row.source_id,
            source_listing_id: row.source_listing_id,
            source_url: row.source_url,
            street_address: row.street_address,
            unit: row.unit,
            neighborhood: row.neighborhood,
            borough: row.borough,
            price: row.price,
            beds: row.beds,
            baths: row.baths,
            image_urls,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
            status: row.status.parse().unwrap_or(ListingStatus::Active),
            is_duplicate: row.is_duplicate,
            canonical_id: row.canonical_id,
            canonical_key: row.canonical_key,
        }
    }
}

const INSERT_COLUMNS: &str = r#"
    source_id, source_listing_id, source_url, source_key,
    street_address, unit, neighborhood, borough,
    price, beds, baths, image_urls,
    first_seen_at, last_seen_at, status, is_duplicate, canonical_id, canonical_key
"#;

fn bind_insert<'q>(
    query: sqlx::query::QueryAs<'q, Postgres, (Uuid,), sqlx::postgres::PgArguments>,
    record: &'q InsertListing,
    is_duplicate: bool,
) -> sqlx::query::QueryAs<'q, Postgres, (Uuid,), sqlx::postgres::PgArguments> {
    let listing = &record.listing;
    query
        .bind(&listing.source_id)
        .bind(&listing.source_listing_id)
        .bind(&listing.source_url)
        .bind(listing.source_key())
        .bind(&listing.street_address)
        .bind(&listing.unit)
        .bind(&listing.neighborhood)
        .bind(&listing.borough)
        .bind(listing.price)
        .bind(listing.beds)
        .bind(listing.baths)
        .bind(serde_json::json!(listing.image_urls))
        .bind(record.seen_at)
        .bind(record.seen_at)
        .bind(is_duplicate)
        .bind(record.canonical_id)
        .bind(&record.canonical_key)
}

impl ListingBackend for ListingRepository {
    async fn find_by_key(
        &self,
        source_id: &str,
        source_key: &str,
    ) -> Result<Option<ListingRecord>, AppError> {
        let row = sqlx::query_as::<_, ListingRow>(
            r#"SELECT * FROM listings WHERE source_id = $1 AND source_key = $2"#,
        )
        .bind(source_id)
        .bind(source_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn record_sighting(&self, id: Uuid, update: &SightingUpdate) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE listings
            SET price = $2, image_urls = $3, last_seen_at = $4, status = 'active'
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.price)
        .bind(serde_json::json!(update.image_urls))
        .bind(update.seen_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_canonical(
        &self,
        canonical_key: &str,
        exclude_source: &str,
    ) -> Result<Option<ListingRecord>, AppError> {
        let row = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT * FROM listings
            WHERE canonical_key = $1 AND NOT is_duplicate AND source_id <> $2
            LIMIT 1
            "#,
        )
        .bind(canonical_key)
        .bind(exclude_source)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn try_insert_canonical(
        &self,
        record: &InsertListing,
    ) -> Result<CanonicalInsert, AppError> {
        let sql = format!(
            r#"
            INSERT INTO listings ({INSERT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'active', $15, $16, $17)
            ON CONFLICT (canonical_key) WHERE NOT is_duplicate DO NOTHING
            RETURNING id
            "#
        );
        let inserted = bind_insert(sqlx::query_as::<_, (Uuid,)>(&sql), record, false)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if let Some((id,)) = inserted {
            return Ok(CanonicalInsert::Inserted(id));
        }

        // Lost the slot: return the record that holds it.
        let winner = sqlx::query_as::<_, ListingRow>(
            r#"SELECT * FROM listings WHERE canonical_key = $1 AND NOT is_duplicate LIMIT 1"#,
        )
        .bind(&record.canonical_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?
        .ok_or_else(|| {
            AppError::DatabaseError(format!(
                "canonical slot for {} conflicted but holder not found",
                record.canonical_key
            ))
        })?;

        Ok(CanonicalInsert::Lost(winner.into()))
    }

    async fn insert_duplicate(&self, record: &InsertListing) -> Result<Uuid, AppError> {
        debug_assert!(record.canonical_id.is_some());
        let sql = format!(
            r#"
            INSERT INTO listings ({INSERT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'active', $15, $16, $17)
            RETURNING id
            "#
        );
        let (id,) = bind_insert(sqlx::query_as::<_, (Uuid,)>(&sql), record, true)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(id)
    }

    async fn active_keys(&self, source_id: &str) -> Result<Vec<String>, AppError> {
        let keys: Vec<(String,)> = sqlx::query_as(
            r#"SELECT source_key FROM listings WHERE source_id = $1 AND status = 'active'"#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(keys.into_iter().map(|(k,)| k).collect())
    }

    async fn delist_missing(
        &self,
        source_id: &str,
        seen_keys: &[String],
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET status = 'delisted'
            WHERE source_id = $1 AND status = 'active' AND source_key <> ALL($2)
            "#,
        )
        .bind(source_id)
        .bind(seen_keys)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn list_canonical(&self, limit: usize) -> Result<Vec<ListingRecord>, AppError> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT * FROM listings
            WHERE NOT is_duplicate
            ORDER BY first_seen_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
