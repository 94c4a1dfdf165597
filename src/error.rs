use thiserror::Error;

/// Errors surfaced by the scrape pipeline and the catalog.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// One search input could not be resolved into detail links
    #[error("search resolution failed for {url}: {reason}")]
    SearchResolution { url: String, reason: String },

    /// One detail page failed or produced no listing
    #[error("detail extraction failed for {url}: {reason}")]
    DetailExtraction { url: String, reason: String },

    /// The render session itself could not be started
    #[error("render session failed to launch for {source_name}: {reason}")]
    SessionLaunch { source_name: String, reason: String },

    /// Persistence failure; the surrounding transaction is rolled back
    #[error("catalog error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller-supplied parameters rejected before any scraping
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ScrapeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn search_resolution(url: &str, err: &anyhow::Error) -> Self {
        Self::SearchResolution {
            url: url.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub fn detail_extraction(url: &str, reason: impl Into<String>) -> Self {
        Self::DetailExtraction {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
