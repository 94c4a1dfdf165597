//! Extraction helpers shared by the site adapters.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Resolve `href` against `base`, dropping fragments.
pub fn normalize_url(href: &str, base: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }
    let mut url = Url::parse(base).ok()?.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

/// Keep absolute http(s) images that do not match an exclusion keyword,
/// first occurrence wins, at most `max` of them.
pub fn filter_property_images<I, S>(raw: I, exclusions: &[String], max: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut images: Vec<String> = Vec::new();
    for src in raw {
        let src = src.as_ref().trim();
        if !(src.starts_with("http://") || src.starts_with("https://")) {
            continue;
        }
        let lower = src.to_lowercase();
        if exclusions.iter().any(|keyword| lower.contains(keyword.as_str())) {
            continue;
        }
        if images.iter().any(|seen| seen == src) {
            continue;
        }
        images.push(src.to_string());
        if images.len() >= max {
            break;
        }
    }
    images
}

/// Listing attributes recognized in free page text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFeatures {
    pub price: String,
    pub area: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub parking: String,
    pub estrato: String,
}

fn cached_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn first_of(patterns: &[&Regex], text: &str) -> String {
    patterns
        .iter()
        .find_map(|re| first_capture(re, text))
        .unwrap_or_default()
}

/// Pull price, area, rooms, parking and estrato out of rendered text.
/// Labelled forms ("Alcobas: 3") win over inline ones ("3 alcobas").
pub fn extract_features_from_text(text: &str) -> TextFeatures {
    static PRICE: OnceLock<Regex> = OnceLock::new();
    static AREA_LABEL: OnceLock<Regex> = OnceLock::new();
    static AREA_INLINE: OnceLock<Regex> = OnceLock::new();
    static BEDROOMS_LABEL: OnceLock<Regex> = OnceLock::new();
    static BEDROOMS_INLINE: OnceLock<Regex> = OnceLock::new();
    static BATHROOMS_LABEL: OnceLock<Regex> = OnceLock::new();
    static BATHROOMS_INLINE: OnceLock<Regex> = OnceLock::new();
    static PARKING_LABEL: OnceLock<Regex> = OnceLock::new();
    static PARKING_INLINE: OnceLock<Regex> = OnceLock::new();
    static ESTRATO: OnceLock<Regex> = OnceLock::new();

    let price = cached_regex(&PRICE, r"\$\s*([\d][\d\.,]*)");
    let area_label = cached_regex(&AREA_LABEL, r"(?i)[áa]rea\s*(?:construida|cons|privada)?\s*:?\s*(\d+(?:[\.,]\d+)?)\s*m");
    let area_inline = cached_regex(&AREA_INLINE, r"(?i)(\d+(?:[\.,]\d+)?)\s*(?:m2|m²|mts)");
    let bedrooms_label = cached_regex(&BEDROOMS_LABEL, r"(?i)(?:alcobas|habitaciones)\s*:\s*(\d+)");
    let bedrooms_inline = cached_regex(&BEDROOMS_INLINE, r"(?i)(\d+)\s*(?:alcobas?|habitaci[oó]n(?:es)?)");
    let bathrooms_label = cached_regex(&BATHROOMS_LABEL, r"(?i)baños\s*:\s*(\d+)");
    let bathrooms_inline = cached_regex(&BATHROOMS_INLINE, r"(?i)(\d+)\s*baños?");
    let parking_label = cached_regex(&PARKING_LABEL, r"(?i)(?:garajes?|parqueaderos?)\s*:\s*(\d+)");
    let parking_inline = cached_regex(&PARKING_INLINE, r"(?i)(\d+)\s*(?:garajes?|parqueaderos?)");
    let estrato = cached_regex(&ESTRATO, r"(?i)estrato\s*:?\s*(\d+)");

    TextFeatures {
        price: first_capture(price, text)
            .map(|digits| format!("$ {digits}"))
            .unwrap_or_default(),
        area: first_of(&[area_label, area_inline], text),
        bedrooms: first_of(&[bedrooms_label, bedrooms_inline], text),
        bathrooms: first_of(&[bathrooms_label, bathrooms_inline], text),
        parking: first_of(&[parking_label, parking_inline], text),
        estrato: first_of(&[estrato], text),
    }
}

/// Find coordinates embedded in a page's HTML.
///
/// Tries, in order, a Mapbox feedback link (`#/lon/lat/zoom`), `"latitud"` /
/// `"longitud"` JSON keys, and a Google Maps `destination=lat,lon` link.
pub fn extract_gps_coordinates(html: &str) -> (Option<f64>, Option<f64>) {
    static MAPBOX: OnceLock<Regex> = OnceLock::new();
    static JSON_LAT: OnceLock<Regex> = OnceLock::new();
    static JSON_LON: OnceLock<Regex> = OnceLock::new();
    static GOOGLE: OnceLock<Regex> = OnceLock::new();

    let mapbox = cached_regex(&MAPBOX, r"apps\.mapbox\.com/feedback/[^#]*#/(-?\d+\.\d+)/(-?\d+\.\d+)");
    if let Some(caps) = mapbox.captures(html) {
        if let (Ok(lon), Ok(lat)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) {
            return (Some(lat), Some(lon));
        }
    }

    let json_lat = cached_regex(&JSON_LAT, r#""latitud"\s*:\s*"?(-?\d+\.\d+)"#);
    let json_lon = cached_regex(&JSON_LON, r#""longitud"\s*:\s*"?(-?\d+\.\d+)"#);
    let lat = first_capture(json_lat, html).and_then(|v| v.parse().ok());
    let lon = first_capture(json_lon, html).and_then(|v| v.parse().ok());
    if lat.is_some() && lon.is_some() {
        return (lat, lon);
    }

    let google = cached_regex(&GOOGLE, r"google\.[a-z.]+/maps[^\s]*?destination=(-?\d+\.\d+),(-?\d+\.\d+)");
    if let Some(caps) = google.captures(html) {
        if let (Ok(lat), Ok(lon)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) {
            return (Some(lat), Some(lon));
        }
    }

    (None, None)
}

/// Parse a CSS selector known at compile time.
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e}"))
}

/// Collapsed, trimmed text of an element
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible text of the document body, one text node per line
pub fn body_text(document: &Html) -> String {
    let body = selector("body");
    document
        .select(&body)
        .next()
        .map(|b| {
            b.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Strip accents and lowercase, for matching neighborhood names in slugs
pub fn fold_accents(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("/inmueble.html?codigo=42#fotos", "https://example.com/busqueda.html"),
            Some("https://example.com/inmueble.html?codigo=42".to_string())
        );
        assert_eq!(
            normalize_url("https://other.com/a", "https://example.com/"),
            Some("https://other.com/a".to_string())
        );
        assert_eq!(normalize_url("javascript:void(0)", "https://example.com/"), None);
    }

    #[test]
    fn test_filter_property_images() {
        let exclusions = vec!["logo".to_string(), "whatsapp".to_string()];
        let raw = [
            "https://cdn.example.com/1.jpg",
            "/relative/2.jpg",
            "https://cdn.example.com/LOGO.png",
            "https://cdn.example.com/1.jpg",
            "https://cdn.example.com/whatsapp-icon.svg",
            "https://cdn.example.com/3.jpg",
            "https://cdn.example.com/4.jpg",
        ];

        let images = filter_property_images(raw, &exclusions, 2);
        assert_eq!(
            images,
            vec!["https://cdn.example.com/1.jpg", "https://cdn.example.com/3.jpg"]
        );
    }

    #[test]
    fn test_extract_features_labelled_and_inline() {
        let text = "Apartamento en arriendo\n$ 2.800.000\nÁrea construida: 75 m2\n\
                    Alcobas: 3\nBaños: 2\nParqueadero: 1\nEstrato 4";
        let features = extract_features_from_text(text);
        assert_eq!(features.price, "$ 2.800.000");
        assert_eq!(features.area, "75");
        assert_eq!(features.bedrooms, "3");
        assert_eq!(features.bathrooms, "2");
        assert_eq!(features.parking, "1");
        assert_eq!(features.estrato, "4");

        let inline = extract_features_from_text("Lindo apto con 2 habitaciones, 1 baño y 60 m2");
        assert_eq!(inline.bedrooms, "2");
        assert_eq!(inline.bathrooms, "1");
        assert_eq!(inline.area, "60");
        assert_eq!(inline.parking, "");
    }

    #[test]
    fn test_extract_gps_coordinates() {
        let mapbox = r#"<a href="https://apps.mapbox.com/feedback/?owner=x#/-75.58847/6.17802/15">"#;
        assert_eq!(extract_gps_coordinates(mapbox), (Some(6.17802), Some(-75.58847)));

        let json = r#"var data = {"latitud": 6.1712, "longitud": -75.5901};"#;
        assert_eq!(extract_gps_coordinates(json), (Some(6.1712), Some(-75.5901)));

        let google = r#"<a href="https://www.google.com/maps/dir/?api=1&destination=6.17426,-75.5862">"#;
        assert_eq!(extract_gps_coordinates(google), (Some(6.17426), Some(-75.5862)));

        assert_eq!(extract_gps_coordinates("<p>sin mapa</p>"), (None, None));
    }

    #[test]
    fn test_fold_accents() {
        assert_eq!(fold_accents("Zuñiga"), "zuniga");
        assert_eq!(fold_accents("La Abadía"), "la abadia");
    }
}
