use crate::models::Listing;
use crate::scrapers::browser::SessionLauncher;
use crate::scrapers::orchestrator;
use crate::scrapers::traits::SiteAdapter;
use crate::scrapers::types::ScrapeOverrides;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};

/// Scrape all `adapters` concurrently, each with its own render session.
///
/// A source that fails contributes nothing; the others are neither cancelled
/// nor delayed by it.
pub async fn scrape_all(
    adapters: &[Arc<dyn SiteAdapter>],
    launcher: &dyn SessionLauncher,
    overrides: &ScrapeOverrides,
) -> Vec<Listing> {
    let runs = adapters.iter().map(|adapter| async move {
        let config = adapter.default_config().with_overrides(overrides);
        match orchestrator::scrape(adapter.as_ref(), launcher, &config).await {
            Ok(listings) => {
                info!(source = adapter.name(), count = listings.len(), "Source scraped");
                listings
            }
            Err(e) => {
                error!(source = adapter.name(), error = %e, "Source scrape failed");
                Vec::new()
            }
        }
    });

    let listings: Vec<Listing> = join_all(runs).await.into_iter().flatten().collect();
    info!(sources = adapters.len(), total = listings.len(), "All sources scraped");
    listings
}
