use crate::config::Settings;
use crate::error::Result;
use crate::geo::GeoFence;
use crate::models::BatchStats;
use crate::refresh::{Clock, RefreshPolicy, SystemClock};
use crate::scrapers::browser::{ChromeLauncher, SessionLauncher};
use crate::scrapers::coordinator;
use crate::scrapers::registry::{AdapterRegistry, SourceSelection};
use crate::scrapers::types::{PriceRange, ScrapeOverrides};
use crate::storage::{Catalog, ReconcileOptions};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// One request to refresh the catalog.
#[derive(Debug, Clone, Default)]
pub struct ScrapeRequest {
    pub source: SourceSelection,
    pub force: bool,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScrapeOutcome {
    /// Inside the cooldown window; nothing was scraped.
    Cached { last_scraped_at: DateTime<Utc> },
    Completed(BatchStats),
}

/// Scrapes the selected sources and reconciles the result into the catalog.
pub struct ScrapeService {
    catalog: Catalog,
    launcher: Arc<dyn SessionLauncher>,
    registry: AdapterRegistry,
    geofence: GeoFence,
    reconcile: ReconcileOptions,
    policy: RefreshPolicy,
    clock: Arc<dyn Clock>,
}

impl ScrapeService {
    pub fn new(
        catalog: Catalog,
        launcher: Arc<dyn SessionLauncher>,
        registry: AdapterRegistry,
    ) -> Self {
        Self {
            catalog,
            launcher,
            registry,
            geofence: GeoFence::default(),
            reconcile: ReconcileOptions::default(),
            policy: RefreshPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Service over the catalog at `settings.database_url`, scraping with Chrome.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let catalog = Catalog::open(&settings.database_url).await?;
        let launcher = Arc::new(ChromeLauncher::new(settings.headless));

        Ok(Self::new(catalog, launcher, AdapterRegistry::with_default_sites())
            .with_geofence(settings.geofence)
            .with_reconcile_options(settings.reconcile)
            .with_policy(RefreshPolicy::new(settings.cooldown())))
    }

    pub fn with_geofence(mut self, geofence: GeoFence) -> Self {
        self.geofence = geofence;
        self
    }

    pub fn with_reconcile_options(mut self, options: ReconcileOptions) -> Self {
        self.reconcile = options;
        self
    }

    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub async fn run(&self, request: &ScrapeRequest) -> Result<ScrapeOutcome> {
        let price_range = PriceRange::from_bounds(request.price_min, request.price_max)?;
        let adapters = self.registry.select(&request.source)?;
        let scope = request.source.scope();

        let now = self.clock.now();
        if let Some(last) = self.catalog.last_scrape(scope).await? {
            if !self.policy.should_scrape(Some(last), now, request.force) {
                info!(scope, last_scraped_at = %last, "Data is fresh, skipping scrape");
                return Ok(ScrapeOutcome::Cached {
                    last_scraped_at: last,
                });
            }
        }

        info!(
            scope,
            sources = adapters.len(),
            ?price_range,
            force = request.force,
            "Starting scrape"
        );
        let overrides = ScrapeOverrides::with_price_range(price_range);
        let mut listings =
            coordinator::scrape_all(&adapters, self.launcher.as_ref(), &overrides).await;

        for listing in &mut listings {
            self.geofence.scrub(listing);
        }

        let finished_at = self.clock.now();
        let stats = self
            .catalog
            .upsert_batch_with(&listings, self.reconcile, finished_at)
            .await?;
        self.catalog.record_scrape(scope, finished_at).await?;

        Ok(ScrapeOutcome::Completed(stats))
    }
}
