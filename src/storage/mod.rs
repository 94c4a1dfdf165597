//! SQLite catalog of scraped properties.
//!
//! Rows are never removed: a listing that disappears from its source gets a
//! `deleted_at` timestamp and is hidden from the read views.

mod catalog;
pub mod reconcile;

pub use catalog::CatalogTx;
pub use reconcile::ReconcileOptions;

use crate::error::{Result, ScrapeError};
use crate::models::{PersistedProperty, PropertyLocation};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS properties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    link TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    code TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    price TEXT NOT NULL DEFAULT '',
    area TEXT NOT NULL DEFAULT '',
    bedrooms TEXT NOT NULL DEFAULT '',
    bathrooms TEXT NOT NULL DEFAULT '',
    parking TEXT NOT NULL DEFAULT '',
    estrato TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    images TEXT NOT NULL DEFAULT '[]',
    image_url TEXT,
    latitude REAL,
    longitude REAL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_properties_source ON properties(source);
CREATE INDEX IF NOT EXISTS idx_properties_deleted_at ON properties(deleted_at);
CREATE INDEX IF NOT EXISTS idx_properties_created_at ON properties(created_at);

CREATE TABLE IF NOT EXISTS scrape_runs (
    scope TEXT PRIMARY KEY,
    finished_at TEXT NOT NULL
);
"#;

pub(crate) const PROPERTY_COLUMNS: &str = "id, link, source, code, title, location, price, area, \
     bedrooms, bathrooms, parking, estrato, description, images, image_url, \
     latitude, longitude, created_at, updated_at, deleted_at";

/// Persistent property catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Open (creating if needed) the catalog at `database_url`,
    /// e.g. `sqlite://rental_scout.db`.
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let catalog = Self { pool };
        catalog.run_migrations().await?;
        info!(database_url, "Catalog opened");
        Ok(catalog)
    }

    /// Ephemeral catalog for tests. A single connection that never expires,
    /// since every in-memory connection would otherwise get its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let catalog = Self { pool };
        catalog.run_migrations().await?;
        Ok(catalog)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start the single transaction a reconciliation batch runs in.
    pub async fn begin(&self) -> Result<CatalogTx> {
        Ok(CatalogTx::new(self.pool.begin().await?))
    }

    pub async fn find_by_link(&self, link: &str) -> Result<Option<PersistedProperty>> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE link = ?");
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(link)
            .fetch_optional(&self.pool)
            .await?
            .map(PropertyRow::into_property)
            .transpose()
    }

    /// Active properties, newest first.
    pub async fn active_properties(&self, skip: i64, limit: i64) -> Result<Vec<PersistedProperty>> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT ? OFFSET ?"
        );
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PropertyRow::into_property)
            .collect()
    }

    /// Active properties that can be placed on a map.
    pub async fn property_locations(&self) -> Result<Vec<PropertyLocation>> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE deleted_at IS NULL AND latitude IS NOT NULL AND longitude IS NOT NULL"
        );
        let rows = sqlx::query_as::<_, PropertyRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut locations = Vec::with_capacity(rows.len());
        for row in rows {
            let property = row.into_property()?;
            let (Some(latitude), Some(longitude)) = (property.latitude, property.longitude) else {
                continue;
            };
            locations.push(PropertyLocation {
                id: property.id,
                latitude,
                longitude,
                title: property.title,
                price: property.price,
                source: property.source,
                link: property.link,
                image_url: property.image_url,
                location: property.location,
                code: property.code,
                images: property.images,
            });
        }
        Ok(locations)
    }

    /// When a scrape of `scope` last completed.
    pub async fn last_scrape(&self, scope: &str) -> Result<Option<DateTime<Utc>>> {
        let finished: Option<String> =
            sqlx::query_scalar("SELECT finished_at FROM scrape_runs WHERE scope = ?")
                .bind(scope)
                .fetch_optional(&self.pool)
                .await?;

        finished.as_deref().map(parse_timestamp).transpose()
    }

    pub async fn record_scrape(&self, scope: &str, finished_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scrape_runs (scope, finished_at) VALUES (?, ?)
            ON CONFLICT (scope) DO UPDATE SET finished_at = excluded.finished_at
            "#,
        )
        .bind(scope)
        .bind(format_timestamp(finished_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PropertyRow {
    id: i64,
    link: String,
    source: String,
    code: String,
    title: String,
    location: String,
    price: String,
    area: String,
    bedrooms: String,
    bathrooms: String,
    parking: String,
    estrato: String,
    description: String,
    images: String,
    image_url: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl PropertyRow {
    pub(crate) fn into_property(self) -> Result<PersistedProperty> {
        Ok(PersistedProperty {
            id: self.id,
            images: serde_json::from_str(&self.images)?,
            link: self.link,
            source: self.source,
            code: self.code,
            title: self.title,
            location: self.location,
            price: self.price,
            area: self.area,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            parking: self.parking,
            estrato: self.estrato,
            description: self.description,
            image_url: self.image_url,
            latitude: self.latitude,
            longitude: self.longitude,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            deleted_at: self.deleted_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            let reason = format!("invalid timestamp {value}: {e}");
            ScrapeError::Store(sqlx::Error::Decode(reason.into()))
        })
}
