//! Batch reconciliation of scraped listings against the catalog.
//!
//! A batch is authoritative for every source it contains: links of those
//! sources that the batch does not mention are soft-deleted, links that
//! reappear are brought back. Sources absent from the batch are left alone.

use super::{Catalog, CatalogTx};
use crate::error::Result;
use crate::models::{BatchStats, Listing, PersistedProperty};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ReconcileOptions {
    /// Minimum share of a source's previously active listings the batch must
    /// see again before missing links are treated as delisted. Links new in
    /// the batch do not count. `0.0` always trusts the batch.
    pub soft_delete_min_ratio: f64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            soft_delete_min_ratio: 0.0,
        }
    }
}

impl Catalog {
    /// Upsert `listings` and soft-delete what their sources no longer publish.
    pub async fn upsert_batch(&self, listings: &[Listing]) -> Result<BatchStats> {
        self.upsert_batch_with(listings, ReconcileOptions::default(), Utc::now())
            .await
    }

    /// [`upsert_batch`](Self::upsert_batch) with explicit options and clock reading.
    pub async fn upsert_batch_with(
        &self,
        listings: &[Listing],
        options: ReconcileOptions,
        now: DateTime<Utc>,
    ) -> Result<BatchStats> {
        let unique = dedupe_by_link(listings);
        let mut stats = BatchStats {
            input_count: listings.len(),
            processed: unique.len(),
            ..BatchStats::default()
        };

        let mut tx = self.begin().await?;
        // active rows this batch saw again, per source
        let mut reseen: HashMap<&str, usize> = HashMap::new();

        for listing in unique.values() {
            match tx.find_by_link(&listing.link).await? {
                None => {
                    tx.insert(listing, now).await?;
                    stats.created += 1;
                }
                Some(mut existing) => {
                    if existing.is_active() {
                        *reseen.entry(listing.source.as_str()).or_default() += 1;
                    }
                    if merge_listing(&mut existing, listing) {
                        existing.updated_at = now;
                        tx.update(&existing).await?;
                    }
                }
            }
        }

        stats.soft_deleted =
            soft_delete_missing(&mut tx, &unique, &reseen, options, now).await?;

        tx.commit().await?;

        info!(
            created = stats.created,
            soft_deleted = stats.soft_deleted,
            processed = stats.processed,
            input = stats.input_count,
            "Batch saved"
        );
        Ok(stats)
    }
}

/// One listing per link; a later occurrence replaces an earlier one.
fn dedupe_by_link(listings: &[Listing]) -> IndexMap<&str, &Listing> {
    let mut unique = IndexMap::with_capacity(listings.len());
    for listing in listings {
        unique.insert(listing.link.as_str(), listing);
    }
    unique
}

async fn soft_delete_missing(
    tx: &mut CatalogTx,
    unique: &IndexMap<&str, &Listing>,
    reseen: &HashMap<&str, usize>,
    options: ReconcileOptions,
    now: DateTime<Utc>,
) -> Result<usize> {
    let mut sources: Vec<&str> = unique.values().map(|l| l.source.as_str()).collect();
    if sources.is_empty() {
        return Ok(0);
    }
    sources.sort_unstable();
    sources.dedup();
    let links: HashSet<&str> = unique.keys().copied().collect();

    let stale = tx.active_by_sources_excluding_links(&sources, &links).await?;

    let mut stale_by_source: HashMap<&str, Vec<&PersistedProperty>> = HashMap::new();
    for property in &stale {
        stale_by_source
            .entry(property.source.as_str())
            .or_default()
            .push(property);
    }

    let mut deleted = 0;
    for (source, properties) in stale_by_source {
        let seen = reseen.get(source).copied().unwrap_or_default();
        if !batch_is_trusted(seen, properties.len(), options.soft_delete_min_ratio) {
            warn!(
                source,
                seen,
                missing = properties.len(),
                "Batch covers too little of the source, skipping soft delete"
            );
            continue;
        }

        for property in properties {
            debug!(link = %property.link, source, "Marking delisted");
            tx.mark_deleted(property.id, now).await?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

fn batch_is_trusted(seen: usize, missing: usize, min_ratio: f64) -> bool {
    if min_ratio <= 0.0 {
        return true;
    }
    let total = seen + missing;
    total == 0 || seen as f64 / total as f64 >= min_ratio
}

/// Fold a fresh sighting into the stored row.
///
/// Empty incoming values carry no information and never clear a stored value:
/// adapters regularly miss a field on one pass and find it on the next.
/// Returns whether the row changed, including resurrection of a deleted row.
pub fn merge_listing(existing: &mut PersistedProperty, incoming: &Listing) -> bool {
    let mut changed = false;

    let fields = [
        (&mut existing.source, &incoming.source),
        (&mut existing.code, &incoming.code),
        (&mut existing.title, &incoming.title),
        (&mut existing.location, &incoming.location),
        (&mut existing.price, &incoming.price),
        (&mut existing.area, &incoming.area),
        (&mut existing.bedrooms, &incoming.bedrooms),
        (&mut existing.bathrooms, &incoming.bathrooms),
        (&mut existing.parking, &incoming.parking),
        (&mut existing.estrato, &incoming.estrato),
        (&mut existing.description, &incoming.description),
    ];
    for (stored, fresh) in fields {
        changed |= overwrite_text(stored, fresh);
    }

    if !incoming.images.is_empty() && existing.images != incoming.images {
        existing.images = incoming.images.clone();
        existing.image_url = incoming.images.first().cloned();
        changed = true;
    }

    changed |= overwrite_coordinate(&mut existing.latitude, incoming.latitude);
    changed |= overwrite_coordinate(&mut existing.longitude, incoming.longitude);

    changed |= existing.deleted_at.take().is_some();
    changed
}

fn overwrite_text(stored: &mut String, fresh: &str) -> bool {
    if fresh.is_empty() || stored.as_str() == fresh {
        return false;
    }
    *stored = fresh.to_string();
    true
}

fn overwrite_coordinate(stored: &mut Option<f64>, fresh: Option<f64>) -> bool {
    match fresh {
        Some(value) if *stored != Some(value) => {
            *stored = Some(value);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(link: &str) -> PersistedProperty {
        let now = Utc::now();
        PersistedProperty {
            id: 1,
            link: link.to_string(),
            source: "test_source".to_string(),
            code: "001".to_string(),
            title: "Prop 1".to_string(),
            location: "Loc 1".to_string(),
            price: "1000".to_string(),
            area: "60 m2".to_string(),
            bedrooms: "2".to_string(),
            bathrooms: "1".to_string(),
            parking: "1".to_string(),
            estrato: "4".to_string(),
            description: "Cerca al parque".to_string(),
            images: vec!["https://img.example.com/a.jpg".to_string()],
            image_url: Some("https://img.example.com/a.jpg".to_string()),
            latitude: Some(6.17),
            longitude: Some(-75.58),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_empty_fields_never_clear() {
        let mut existing = persisted("http://example.com/1");
        let incoming = Listing::new("http://example.com/1", "test_source");

        assert!(!merge_listing(&mut existing, &incoming));
        assert_eq!(existing.title, "Prop 1");
        assert_eq!(existing.images.len(), 1);
        assert_eq!(existing.latitude, Some(6.17));
    }

    #[test]
    fn test_provided_fields_overwrite() {
        let mut existing = persisted("http://example.com/1");
        let mut incoming = Listing::new("http://example.com/1", "test_source");
        incoming.price = "1100".to_string();
        incoming.images = vec![
            "https://img.example.com/b.jpg".to_string(),
            "https://img.example.com/c.jpg".to_string(),
        ];

        assert!(merge_listing(&mut existing, &incoming));
        assert_eq!(existing.price, "1100");
        assert_eq!(existing.title, "Prop 1");
        assert_eq!(existing.image_url.as_deref(), Some("https://img.example.com/b.jpg"));
        assert_eq!(existing.images.len(), 2);
    }

    #[test]
    fn test_reappearance_resurrects() {
        let mut existing = persisted("http://example.com/1");
        existing.deleted_at = Some(Utc::now());
        let incoming = Listing::new("http://example.com/1", "test_source");

        assert!(merge_listing(&mut existing, &incoming));
        assert!(existing.is_active());
    }

    #[test]
    fn test_dedupe_keeps_last_occurrence() {
        let mut first = Listing::new("http://example.com/1", "s");
        first.title = "old".to_string();
        let other = Listing::new("http://example.com/2", "s");
        let mut last = Listing::new("http://example.com/1", "s");
        last.title = "new".to_string();

        let listings = [first, other, last];
        let unique = dedupe_by_link(&listings);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique["http://example.com/1"].title, "new");
        assert_eq!(unique.keys().next(), Some(&"http://example.com/1"));
    }

    #[test]
    fn test_trust_ratio() {
        assert!(batch_is_trusted(1, 100, 0.0));
        assert!(!batch_is_trusted(1, 9, 0.5));
        assert!(batch_is_trusted(5, 5, 0.5));
    }
}
