#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rental_scout::models::Listing;
use rental_scout::scrapers::{
    Page, PriceRange, RenderSession, ScrapeConfig, SearchInput, SessionLauncher, SiteAdapter,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Current and peak number of concurrent holders.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct FakePage {
    open_pages: Arc<Gauge>,
    url: Mutex<Option<String>>,
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        *self.url.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<()> {
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn evaluate(&self, _script: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn close(&self) -> Result<()> {
        self.open_pages.exit();
        Ok(())
    }
}

pub struct FakeSession {
    open_pages: Arc<Gauge>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        self.open_pages.enter();
        Ok(Box::new(FakePage {
            open_pages: Arc::clone(&self.open_pages),
            url: Mutex::new(None),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out in-process sessions and tracks how many pages are open at once.
#[derive(Default)]
pub struct FakeLauncher {
    pub fail: bool,
    pub launches: AtomicUsize,
    pub sessions_closed: Arc<AtomicUsize>,
    pub open_pages: Arc<Gauge>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self, _config: &ScrapeConfig) -> Result<Box<dyn RenderSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("chrome binary not found"));
        }
        Ok(Box::new(FakeSession {
            open_pages: Arc::clone(&self.open_pages),
            closed: Arc::clone(&self.sessions_closed),
        }))
    }
}

/// Scripted adapter: search URLs map to fixed link lists, detail pages
/// succeed unless listed as failing or empty.
pub struct FakeAdapter {
    pub source: String,
    pub config: ScrapeConfig,
    pub searches: Vec<(SearchInput, Option<Vec<String>>)>,
    pub failing_details: HashSet<String>,
    pub empty_details: HashSet<String>,
    pub coordinates: HashMap<String, (f64, f64)>,
    pub delay: Duration,
    pub detail_gauge: Gauge,
    pub search_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub seen_price_ranges: Mutex<Vec<PriceRange>>,
}

impl FakeAdapter {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            config: ScrapeConfig::default(),
            searches: Vec::new(),
            failing_details: HashSet::new(),
            empty_details: HashSet::new(),
            coordinates: HashMap::new(),
            delay: Duration::from_millis(5),
            detail_gauge: Gauge::default(),
            search_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
            seen_price_ranges: Mutex::new(Vec::new()),
        }
    }

    /// A search input that resolves to `links`.
    pub fn with_search(mut self, metadata: &str, links: &[String]) -> Self {
        let url = format!("https://{}/search/{}", self.source, self.searches.len());
        self.searches
            .push((SearchInput::new(url, metadata), Some(links.to_vec())));
        self
    }

    /// A search input whose page fails to resolve.
    pub fn with_failing_search(mut self, metadata: &str) -> Self {
        let url = format!("https://{}/search/{}", self.source, self.searches.len());
        self.searches.push((SearchInput::new(url, metadata), None));
        self
    }

    pub fn with_config(mut self, config: ScrapeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_detail(mut self, link: &str) -> Self {
        self.failing_details.insert(link.to_string());
        self
    }

    pub fn empty_detail(mut self, link: &str) -> Self {
        self.empty_details.insert(link.to_string());
        self
    }

    pub fn at(mut self, link: &str, latitude: f64, longitude: f64) -> Self {
        self.coordinates
            .insert(link.to_string(), (latitude, longitude));
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SiteAdapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.source
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn default_config(&self) -> ScrapeConfig {
        self.config.clone()
    }

    fn get_search_inputs(&self, config: &ScrapeConfig) -> Vec<SearchInput> {
        self.seen_price_ranges
            .lock()
            .unwrap()
            .extend(config.price_ranges.iter().copied());
        self.searches.iter().map(|(input, _)| input.clone()).collect()
    }

    async fn extract_links_from_search_page(
        &self,
        page: &dyn Page,
        url: &str,
    ) -> Result<Vec<String>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        page.goto(url).await?;
        tokio::time::sleep(self.delay).await;

        let (_, links) = self
            .searches
            .iter()
            .find(|(input, _)| input.url == url)
            .ok_or_else(|| anyhow!("unexpected search url {url}"))?;
        links.clone().ok_or_else(|| anyhow!("search page timed out"))
    }

    async fn extract_property_details(
        &self,
        page: &dyn Page,
        url: &str,
        metadata: &str,
        _config: &ScrapeConfig,
    ) -> Result<Option<Listing>> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.detail_gauge.enter();
        page.goto(url).await?;
        tokio::time::sleep(self.delay).await;
        self.detail_gauge.exit();

        if self.failing_details.contains(url) {
            return Err(anyhow!("selector timed out"));
        }
        if self.empty_details.contains(url) {
            return Ok(None);
        }

        let mut listing = Listing::new(url, self.source.as_str());
        listing.title = format!("Apartamento {url}");
        listing.location = metadata.to_string();
        listing.price = "$ 2.900.000".to_string();
        if let Some((lat, lon)) = self.coordinates.get(url) {
            listing.latitude = Some(*lat);
            listing.longitude = Some(*lon);
        }
        Ok(Some(listing))
    }
}

pub fn links(prefix: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("https://{prefix}/inmueble/{i}"))
        .collect()
}
