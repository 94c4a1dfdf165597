use crate::error::{Result, ScrapeError};
use crate::scrapers::arrendamientos_envigado::ArrendamientosEnvigado;
use crate::scrapers::livinmobiliaria::Livinmobiliaria;
use crate::scrapers::traits::SiteAdapter;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which sources a scrape run covers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceSelection {
    #[default]
    All,
    Named(String),
}

impl SourceSelection {
    /// Key the cooldown for this selection is tracked under.
    pub fn scope(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Named(source) => source,
        }
    }
}

impl FromStr for SourceSelection {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            Ok(Self::Named(value.to_string()))
        }
    }
}

impl fmt::Display for SourceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scope())
    }
}

/// Registered site adapters, in registration order.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Registry with every site this crate knows how to scrape.
    pub fn with_default_sites() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ArrendamientosEnvigado::new()));
        registry.register(Arc::new(Livinmobiliaria::new()));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.push(adapter);
    }

    /// Source identifiers accepted by [`select`](Self::select).
    pub fn sources(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.source()).collect()
    }

    /// Adapters covered by `selection`; an unknown source name is rejected.
    pub fn select(&self, selection: &SourceSelection) -> Result<Vec<Arc<dyn SiteAdapter>>> {
        match selection {
            SourceSelection::All => Ok(self.adapters.clone()),
            SourceSelection::Named(source) => self
                .adapters
                .iter()
                .find(|a| a.source() == source)
                .map(|a| vec![Arc::clone(a)])
                .ok_or_else(|| {
                    ScrapeError::validation(format!(
                        "Unknown source '{source}'. Available: all, {}",
                        self.sources().join(", ")
                    ))
                }),
        }
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}
