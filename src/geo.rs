use crate::models::Listing;
use serde::Deserialize;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Parque de Envigado
pub const DEFAULT_CENTER: (f64, f64) = (6.170089, -75.587481);
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Radius around a reference point inside which scraped coordinates are trusted.
///
/// Sites often geocode a listing to the city centroid or to another
/// municipality entirely; such coordinates are dropped while the listing
/// itself is kept.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeoFence {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

impl GeoFence {
    pub fn new(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_km,
        }
    }

    /// Return the pair unchanged when inside the fence, `(None, None)` otherwise.
    pub fn validate(&self, lat: Option<f64>, lon: Option<f64>) -> (Option<f64>, Option<f64>) {
        match (lat, lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                if haversine_km(self.latitude, self.longitude, lat, lon) > self.radius_km {
                    (None, None)
                } else {
                    (Some(lat), Some(lon))
                }
            }
            _ => (None, None),
        }
    }

    /// Like [`validate`](Self::validate) for coordinates still in text form.
    pub fn validate_text(&self, lat: &str, lon: &str) -> (Option<f64>, Option<f64>) {
        self.validate(lat.trim().parse().ok(), lon.trim().parse().ok())
    }

    /// Scrub the listing's coordinates in place.
    pub fn scrub(&self, listing: &mut Listing) {
        let (lat, lon) = self.validate(listing.latitude, listing.longitude);
        listing.latitude = lat;
        listing.longitude = lon;
    }
}

impl Default for GeoFence {
    fn default() -> Self {
        Self::new(DEFAULT_CENTER.0, DEFAULT_CENTER.1, DEFAULT_RADIUS_KM)
    }
}

/// Great-circle distance in kilometers
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}
