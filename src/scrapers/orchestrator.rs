//! Two-phase scrape of a single source.
//!
//! Phase one resolves search pages into detail links, phase two renders each
//! detail page. Each phase has its own semaphore so neither can hold more
//! pages open than its configured limit. A failing search input or detail page
//! is logged and dropped; only a render session that cannot start aborts the
//! run.

use crate::error::{Result, ScrapeError};
use crate::models::Listing;
use crate::scrapers::browser::{RenderSession, SessionLauncher};
use crate::scrapers::traits::SiteAdapter;
use crate::scrapers::types::{ScrapeConfig, SearchInput};
use futures::future::join_all;
use indexmap::IndexMap;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Scrape every listing `adapter` can reach with `config`.
pub async fn scrape(
    adapter: &dyn SiteAdapter,
    launcher: &dyn SessionLauncher,
    config: &ScrapeConfig,
) -> Result<Vec<Listing>> {
    let inputs = adapter.get_search_inputs(config);
    info!(
        source = adapter.name(),
        inputs = inputs.len(),
        "Generated search inputs"
    );

    let session = launcher
        .launch(config)
        .await
        .map_err(|e| ScrapeError::SessionLaunch {
            source_name: adapter.name().to_string(),
            reason: format!("{e:#}"),
        })?;

    let links = discover_links(adapter, session.as_ref(), config, &inputs).await;
    info!(
        source = adapter.name(),
        links = links.len(),
        "Found properties to scrape"
    );

    let listings = extract_details(adapter, session.as_ref(), config, links).await;

    if let Err(e) = session.close().await {
        warn!(source = adapter.name(), error = %e, "Failed to close render session");
    }

    info!(
        source = adapter.name(),
        listings = listings.len(),
        "Scrape finished"
    );
    Ok(listings)
}

/// Resolve search inputs into unique detail URLs, keeping the first metadata seen per URL.
async fn discover_links(
    adapter: &dyn SiteAdapter,
    session: &dyn RenderSession,
    config: &ScrapeConfig,
    inputs: &[SearchInput],
) -> IndexMap<String, String> {
    let semaphore = Semaphore::new(config.search_concurrency.max(1));

    let tasks = inputs.iter().map(|input| {
        let semaphore = &semaphore;
        async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return Vec::new();
            };

            match resolve_search_input(adapter, session, &input.url).await {
                Ok(links) => {
                    debug!(url = %input.url, count = links.len(), "Search page resolved");
                    links
                }
                Err(e) => {
                    let err = ScrapeError::search_resolution(&input.url, &e);
                    warn!(
                        source = adapter.name(),
                        metadata = %input.metadata,
                        error = %err,
                        "Skipping search input"
                    );
                    Vec::new()
                }
            }
        }
    });

    let resolved = join_all(tasks).await;

    let mut links = IndexMap::new();
    for (input, found) in inputs.iter().zip(resolved) {
        for link in found {
            links.entry(link).or_insert_with(|| input.metadata.clone());
        }
    }
    links
}

async fn resolve_search_input(
    adapter: &dyn SiteAdapter,
    session: &dyn RenderSession,
    url: &str,
) -> anyhow::Result<Vec<String>> {
    let page = session.new_page().await?;
    let result = adapter.extract_links_from_search_page(page.as_ref(), url).await;
    if let Err(e) = page.close().await {
        debug!(url, error = %e, "Failed to close search page");
    }
    result
}

async fn extract_details(
    adapter: &dyn SiteAdapter,
    session: &dyn RenderSession,
    config: &ScrapeConfig,
    links: IndexMap<String, String>,
) -> Vec<Listing> {
    let semaphore = Semaphore::new(config.detail_concurrency.max(1));

    let tasks = links.iter().map(|(url, metadata)| {
        let semaphore = &semaphore;
        async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };

            let err = match extract_single(adapter, session, config, url, metadata).await {
                Ok(Some(listing)) => return Some(listing),
                Ok(None) => ScrapeError::detail_extraction(url, "page yielded no listing"),
                Err(e) => ScrapeError::detail_extraction(url, format!("{e:#}")),
            };
            warn!(source = adapter.name(), error = %err, "Skipping detail page");
            None
        }
    });

    join_all(tasks).await.into_iter().flatten().collect()
}

async fn extract_single(
    adapter: &dyn SiteAdapter,
    session: &dyn RenderSession,
    config: &ScrapeConfig,
    url: &str,
    metadata: &str,
) -> anyhow::Result<Option<Listing>> {
    let page = session.new_page().await?;
    let result = adapter
        .extract_property_details(page.as_ref(), url, metadata, config)
        .await;
    if let Err(e) = page.close().await {
        debug!(url, error = %e, "Failed to close detail page");
    }
    result
}
