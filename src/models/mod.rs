use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One listing as extracted from a detail page.
///
/// The descriptive fields are kept exactly as the source formats them;
/// normalizing "$ 2.800.000" or "3 alcobas" is an adapter concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub code: String,
    pub title: String,
    pub location: String,
    pub price: String,
    pub area: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub parking: String,
    pub estrato: String,
    pub description: String,
    /// Absolute image URLs, first one is the primary image
    pub images: Vec<String>,
    /// Detail page URL, the natural key of the catalog
    pub link: String,
    pub source: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Listing {
    pub fn new(link: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A catalog row. `deleted_at` set means the listing is no longer published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedProperty {
    pub id: i64,
    pub link: String,
    pub source: String,
    pub code: String,
    pub title: String,
    pub location: String,
    pub price: String,
    pub area: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub parking: String,
    pub estrato: String,
    pub description: String,
    pub images: Vec<String>,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PersistedProperty {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Compact view used for map rendering.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyLocation {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub price: String,
    pub source: String,
    pub link: String,
    pub image_url: Option<String>,
    pub location: String,
    pub code: String,
    pub images: Vec<String>,
}

/// Counters reported by one reconciliation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Rows inserted for links never seen before
    pub created: usize,
    /// Active rows marked deleted by this batch
    pub soft_deleted: usize,
    /// Unique links in the batch
    pub processed: usize,
    /// Raw listings received, before dedup
    pub input_count: usize,
}
