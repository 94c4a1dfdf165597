//! Render sessions backed by headless Chrome.
//!
//! `headless_chrome` speaks the DevTools protocol synchronously, so every call
//! is moved onto tokio's blocking pool. Async callers are only suspended while
//! a tab navigates or waits, never blocking the runtime.

use crate::scrapers::types::ScrapeConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, info};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A navigable page handed out by a render session
#[async_trait]
pub trait Page: Send + Sync {
    /// Start navigating to `url`.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait for the current navigation to finish loading.
    async fn wait_for_load(&self) -> Result<()>;

    /// Wait until `selector` matches, bounded by the session's selector timeout.
    async fn wait_for_selector(&self, selector: &str) -> Result<()>;

    /// Rendered DOM serialized as HTML
    async fn content(&self) -> Result<String>;

    /// Evaluate a script and return its JSON result (`Null` when undefined).
    async fn evaluate(&self, script: &str) -> Result<Value>;

    async fn close(&self) -> Result<()>;
}

/// One browser instance, owned by a single orchestrator run
#[async_trait]
pub trait RenderSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>>;

    async fn close(&self) -> Result<()>;
}

/// Starts render sessions. A launch failure means the source cannot be scraped at all.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, config: &ScrapeConfig) -> Result<Box<dyn RenderSession>>;
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .context("Browser task panicked")?
}

/// Launches one headless Chrome process per session
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
}

impl ChromeLauncher {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self, config: &ScrapeConfig) -> Result<Box<dyn RenderSession>> {
        info!(headless = self.headless, "Launching headless Chrome");

        let headless = self.headless;
        let browser = blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(headless)
                .build()
                .context("Failed to build launch options")?;

            Browser::new(options).context("Failed to launch Chrome browser")
        })
        .await?;

        Ok(Box::new(ChromeSession {
            browser: Arc::new(browser),
            page_load_timeout: config.page_load_timeout,
            selector_timeout: config.selector_timeout,
        }))
    }
}

pub struct ChromeSession {
    browser: Arc<Browser>,
    page_load_timeout: Duration,
    selector_timeout: Duration,
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        let browser = Arc::clone(&self.browser);
        let page_load_timeout = self.page_load_timeout;

        let tab = blocking(move || {
            let tab = browser.new_tab().context("Failed to open tab")?;
            tab.set_default_timeout(page_load_timeout);
            tab.set_user_agent(USER_AGENT, None, None)?;
            Ok(tab)
        })
        .await?;

        Ok(Box::new(ChromePage {
            tab,
            selector_timeout: self.selector_timeout,
        }))
    }

    async fn close(&self) -> Result<()> {
        let browser = Arc::clone(&self.browser);
        blocking(move || {
            let tabs = browser
                .get_tabs()
                .lock()
                .map_err(|_| anyhow::anyhow!("Browser tab list poisoned"))?;
            for tab in tabs.iter() {
                // Tabs already closed by their page report an error here
                let _ = tab.close(false);
            }
            Ok(())
        })
        .await
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
    selector_timeout: Duration,
}

#[async_trait]
impl Page for ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!(url, "Navigating");
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        blocking(move || {
            tab.navigate_to(&url)
                .with_context(|| format!("Failed to navigate to {url}"))?;
            Ok(())
        })
        .await
    }

    async fn wait_for_load(&self) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        blocking(move || {
            tab.wait_until_navigated().context("Page did not finish loading")?;
            Ok(())
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let selector = selector.to_string();
        let timeout = self.selector_timeout;
        blocking(move || {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)
                .with_context(|| format!("Timed out waiting for {selector}"))?;
            Ok(())
        })
        .await
    }

    async fn content(&self) -> Result<String> {
        let tab = Arc::clone(&self.tab);
        blocking(move || tab.get_content().context("Failed to read page HTML")).await
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let tab = Arc::clone(&self.tab);
        let script = script.to_string();
        blocking(move || {
            let result = tab.evaluate(&script, true).context("Script evaluation failed")?;
            Ok(result.value.unwrap_or(Value::Null))
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        blocking(move || {
            tab.close(false).context("Failed to close tab")?;
            Ok(())
        })
        .await
    }
}
