use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound accepted for a caller-supplied price range (COP)
pub const MAX_PRICE: i64 = 50_000_000;

/// Monthly rent bounds used to build search URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

impl PriceRange {
    /// Validate a caller-supplied range.
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min < 0 || max < 0 {
            return Err(ScrapeError::validation("Prices must be positive"));
        }
        if min >= max {
            return Err(ScrapeError::validation(
                "Min price must be less than max price",
            ));
        }
        if max > MAX_PRICE {
            return Err(ScrapeError::validation(format!(
                "Max price {max} exceeds reasonable limit of {MAX_PRICE}"
            )));
        }
        Ok(Self { min, max })
    }

    /// A range is only built when both bounds are given; a lone bound is ignored.
    pub fn from_bounds(min: Option<i64>, max: Option<i64>) -> Result<Option<Self>> {
        match (min, max) {
            (Some(min), Some(max)) => Self::new(min, max).map(Some),
            _ => Ok(None),
        }
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: 2_500_000,
            max: 3_500_000,
        }
    }
}

/// Per-source tunables for one scrape run
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeConfig {
    /// Max detail pages rendered at once
    pub detail_concurrency: usize,
    /// Max search pages rendered at once
    pub search_concurrency: usize,
    pub page_load_timeout: Duration,
    pub selector_timeout: Duration,
    /// Images whose URL contains any of these (lowercase) are dropped
    pub image_exclusions: Vec<String>,
    pub max_images: usize,
    pub price_ranges: Vec<PriceRange>,
}

impl ScrapeConfig {
    pub fn with_detail_concurrency(mut self, limit: usize) -> Self {
        self.detail_concurrency = limit;
        self
    }

    pub fn with_search_concurrency(mut self, limit: usize) -> Self {
        self.search_concurrency = limit;
        self
    }

    pub fn with_price_ranges(mut self, ranges: Vec<PriceRange>) -> Self {
        self.price_ranges = ranges;
        self
    }

    /// Layer caller overrides on top of these defaults.
    pub fn with_overrides(mut self, overrides: &ScrapeOverrides) -> Self {
        if let Some(ranges) = &overrides.price_ranges {
            self.price_ranges = ranges.clone();
        }
        self
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            detail_concurrency: 4,
            search_concurrency: 3,
            page_load_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(10),
            image_exclusions: ["logo", "icon", "whatsapp", "facebook", "twitter", "openstreetmap"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_images: 15,
            price_ranges: vec![PriceRange::default()],
        }
    }
}

/// Caller-level overrides applied to every selected source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeOverrides {
    pub price_ranges: Option<Vec<PriceRange>>,
}

impl ScrapeOverrides {
    pub fn with_price_range(range: Option<PriceRange>) -> Self {
        Self {
            price_ranges: range.map(|r| vec![r]),
        }
    }
}

/// A search URL plus the context its results inherit (e.g. neighborhood)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInput {
    pub url: String,
    pub metadata: String,
}

impl SearchInput {
    pub fn new(url: impl Into<String>, metadata: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            metadata: metadata.into(),
        }
    }
}
