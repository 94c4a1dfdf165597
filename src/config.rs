//! Runtime settings.
//!
//! Layered lowest to highest: built-in defaults, an optional
//! `rental-scout.toml` in the working directory, then `RENTAL_SCOUT__*`
//! environment variables (`RENTAL_SCOUT__GEOFENCE__RADIUS_KM=5`).

use crate::error::Result;
use crate::geo::{GeoFence, DEFAULT_CENTER, DEFAULT_RADIUS_KM};
use crate::storage::ReconcileOptions;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    /// Minutes an unforced scrape of the same scope is answered from the catalog
    pub cooldown_minutes: i64,
    pub headless: bool,
    /// `tracing_subscriber::EnvFilter` directives, overridden by `RUST_LOG`
    pub log_filter: String,
    pub geofence: GeoFence,
    pub reconcile: ReconcileOptions,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::with_name("rental-scout").required(false))
            .add_source(Environment::with_prefix("RENTAL_SCOUT").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("database_url", "sqlite://rental_scout.db")?
            .set_default("cooldown_minutes", 120)?
            .set_default("headless", true)?
            .set_default("log_filter", "info")?
            .set_default("geofence.latitude", DEFAULT_CENTER.0)?
            .set_default("geofence.longitude", DEFAULT_CENTER.1)?
            .set_default("geofence.radius_km", DEFAULT_RADIUS_KM)?
            .set_default("reconcile.soft_delete_min_ratio", 0.0)?)
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cooldown_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_defaults() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.database_url, "sqlite://rental_scout.db");
        assert_eq!(settings.cooldown(), chrono::Duration::minutes(120));
        assert!(settings.headless);
        assert_eq!(settings.geofence, GeoFence::default());
        assert_eq!(settings.reconcile, ReconcileOptions::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let toml = r#"
            cooldown_minutes = 30
            headless = false

            [geofence]
            radius_km = 4.5

            [reconcile]
            soft_delete_min_ratio = 0.5
        "#;
        let settings: Settings = Settings::defaults()
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.cooldown_minutes, 30);
        assert!(!settings.headless);
        assert_eq!(settings.geofence.radius_km, 4.5);
        assert_eq!(settings.geofence.latitude, DEFAULT_CENTER.0);
        assert_eq!(settings.reconcile.soft_delete_min_ratio, 0.5);
    }
}
