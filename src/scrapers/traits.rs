use crate::models::Listing;
use crate::scrapers::browser::Page;
use crate::scrapers::types::{ScrapeConfig, SearchInput};
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for all listing sources.
///
/// Adapters carry site-specific selectors and fallbacks; the orchestrator only
/// sees this capability set and treats every adapter the same way.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Human readable name used in logs
    fn name(&self) -> &str;

    /// Source identifier stamped on every listing
    fn source(&self) -> &str;

    /// Tuned defaults for this site
    fn default_config(&self) -> ScrapeConfig {
        ScrapeConfig::default()
    }

    /// Search URLs to visit. Must not perform I/O.
    fn get_search_inputs(&self, config: &ScrapeConfig) -> Vec<SearchInput>;

    /// Resolve one search page into detail page URLs.
    async fn extract_links_from_search_page(&self, page: &dyn Page, url: &str)
        -> Result<Vec<String>>;

    /// Extract one listing; `Ok(None)` when the page holds nothing usable.
    async fn extract_property_details(
        &self,
        page: &dyn Page,
        url: &str,
        metadata: &str,
        config: &ScrapeConfig,
    ) -> Result<Option<Listing>>;
}
