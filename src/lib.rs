//! Rental listing scout for Envigado: scrapes real-estate agency sites with
//! headless Chrome and keeps a SQLite catalog of what is currently on offer.

pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod refresh;
pub mod scrapers;
pub mod service;
pub mod storage;

pub use error::{Result, ScrapeError};
pub use models::{BatchStats, Listing, PersistedProperty, PropertyLocation};
pub use service::{ScrapeOutcome, ScrapeRequest, ScrapeService};
pub use storage::Catalog;
