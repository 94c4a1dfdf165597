use super::{format_timestamp, PropertyRow, PROPERTY_COLUMNS};
use crate::error::Result;
use crate::models::{Listing, PersistedProperty};
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use std::collections::HashSet;

/// Catalog primitives scoped to one transaction.
///
/// Nothing is visible to other connections until [`commit`](Self::commit);
/// dropping the value rolls everything back.
pub struct CatalogTx {
    tx: Transaction<'static, Sqlite>,
}

impl CatalogTx {
    pub(super) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub async fn find_by_link(&mut self, link: &str) -> Result<Option<PersistedProperty>> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE link = ?");
        sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(link)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(PropertyRow::into_property)
            .transpose()
    }

    /// Insert a first sighting of `listing`. Returns the new row id.
    pub async fn insert(&mut self, listing: &Listing, now: DateTime<Utc>) -> Result<i64> {
        let images = serde_json::to_string(&listing.images)?;
        let timestamp = format_timestamp(now);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO properties (
                link, source, code, title, location, price, area,
                bedrooms, bathrooms, parking, estrato, description,
                images, image_url, latitude, longitude,
                created_at, updated_at, deleted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
            RETURNING id
            "#,
        )
        .bind(&listing.link)
        .bind(&listing.source)
        .bind(&listing.code)
        .bind(&listing.title)
        .bind(&listing.location)
        .bind(&listing.price)
        .bind(&listing.area)
        .bind(&listing.bedrooms)
        .bind(&listing.bathrooms)
        .bind(&listing.parking)
        .bind(&listing.estrato)
        .bind(&listing.description)
        .bind(images)
        .bind(listing.primary_image())
        .bind(listing.latitude)
        .bind(listing.longitude)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    /// Write back every mutable column of `property`.
    pub async fn update(&mut self, property: &PersistedProperty) -> Result<()> {
        let images = serde_json::to_string(&property.images)?;

        sqlx::query(
            r#"
            UPDATE properties SET
                source = ?, code = ?, title = ?, location = ?, price = ?, area = ?,
                bedrooms = ?, bathrooms = ?, parking = ?, estrato = ?, description = ?,
                images = ?, image_url = ?, latitude = ?, longitude = ?,
                updated_at = ?, deleted_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&property.source)
        .bind(&property.code)
        .bind(&property.title)
        .bind(&property.location)
        .bind(&property.price)
        .bind(&property.area)
        .bind(&property.bedrooms)
        .bind(&property.bathrooms)
        .bind(&property.parking)
        .bind(&property.estrato)
        .bind(&property.description)
        .bind(images)
        .bind(&property.image_url)
        .bind(property.latitude)
        .bind(property.longitude)
        .bind(format_timestamp(property.updated_at))
        .bind(property.deleted_at.map(format_timestamp))
        .bind(property.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// Active rows belonging to `sources` whose link is not in `links`.
    pub async fn active_by_sources_excluding_links(
        &mut self,
        sources: &[&str],
        links: &HashSet<&str>,
    ) -> Result<Vec<PersistedProperty>> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties \
             WHERE deleted_at IS NULL AND source = ? \
             ORDER BY id"
        );

        let mut stale = Vec::new();
        for source in sources {
            let rows = sqlx::query_as::<_, PropertyRow>(&sql)
                .bind(*source)
                .fetch_all(&mut *self.tx)
                .await?;

            for row in rows {
                let property = row.into_property()?;
                if !links.contains(property.link.as_str()) {
                    stale.push(property);
                }
            }
        }
        Ok(stale)
    }

    pub async fn mark_deleted(&mut self, id: i64, now: DateTime<Utc>) -> Result<()> {
        let timestamp = format_timestamp(now);
        sqlx::query("UPDATE properties SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(&timestamp)
            .bind(&timestamp)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
