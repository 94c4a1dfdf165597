use crate::models::Listing;
use crate::scrapers::browser::Page;
use crate::scrapers::helpers::{
    body_text, element_text, extract_features_from_text, extract_gps_coordinates,
    filter_property_images, fold_accents, normalize_url, selector,
};
use crate::scrapers::traits::SiteAdapter;
use crate::scrapers::types::{ScrapeConfig, SearchInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, info};

pub const SOURCE: &str = "livinmobiliaria";

const BASE_URL: &str = "https://www.livinmobiliaria.com";
const SEARCH_URL: &str = "https://www.livinmobiliaria.com/resultados?gestion=Arriendo&tipo=Apartamentos&s=municipio-en-envigado";

/// Spelling found on the site and the neighborhood name it is stored under
const UNIFIED_BARRIOS: &[(&str, &str)] = &[
    ("El Portal", "El Portal"),
    ("Jardines", "Jardines"),
    ("La Abadía", "La Abadia"),
    ("La Abadia", "La Abadia"),
    ("La Frontera", "La Frontera"),
    ("La Magnolia", "La Magnolia"),
    ("Las Flores", "Las Flores"),
    ("Las Vegas", "Las Vegas"),
    ("Loma Benedictinos", "Loma Benedictinos"),
    ("Otra Parte", "Otra Parte"),
    ("Pontevedra", "Pontevedra"),
    ("San Marcos", "San Marcos"),
    ("Villagrande", "Villagrande"),
    ("Zuñiga", "Zuñiga"),
];

/// Collects detail links that appear before the recommendations block,
/// which lists properties from unrelated searches.
const COLLECT_LINKS_SCRIPT: &str = r#"
(() => {
    const results = [];
    const seen = new Set();
    const stopEl = Array.from(document.querySelectorAll('h2, h3, h4, h5, div, span, p')).find(el => {
        if (el.children.length > 3) return false;
        const txt = el.innerText ? el.innerText.trim().toLowerCase() : '';
        return txt.includes('también te puede interesar') || txt.includes('tambien te puede interesar');
    });
    for (const link of document.querySelectorAll('a[href*="detalle-propiedad"]')) {
        if (stopEl && (stopEl.compareDocumentPosition(link) & Node.DOCUMENT_POSITION_FOLLOWING)) continue;
        if (!link.href || seen.has(link.href)) continue;
        seen.add(link.href);
        results.push({ href: link.href });
    }
    return results;
})()
"#;

#[derive(Debug, Deserialize)]
struct Candidate {
    href: String,
}

/// Livin Inmobiliaria (livinmobiliaria.com)
///
/// The site cannot filter by neighborhood, so searches cover all of Envigado
/// and both links and detail pages are checked against the target neighborhoods.
#[derive(Debug, Clone, Copy, Default)]
pub struct Livinmobiliaria;

impl Livinmobiliaria {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteAdapter for Livinmobiliaria {
    fn name(&self) -> &str {
        "Livinmobiliaria"
    }

    fn source(&self) -> &str {
        SOURCE
    }

    fn default_config(&self) -> ScrapeConfig {
        ScrapeConfig::default()
            .with_detail_concurrency(4)
            .with_search_concurrency(3)
    }

    fn get_search_inputs(&self, config: &ScrapeConfig) -> Vec<SearchInput> {
        config
            .price_ranges
            .iter()
            .map(|range| {
                SearchInput::new(
                    format!("{SEARCH_URL}&rango-precio={}-{}", range.min, range.max),
                    "Envigado",
                )
            })
            .collect()
    }

    async fn extract_links_from_search_page(
        &self,
        page: &dyn Page,
        url: &str,
    ) -> Result<Vec<String>> {
        page.goto(url).await?;
        page.wait_for_load().await?;
        if let Err(e) = page.wait_for_selector("a[href*=\"detalle-propiedad\"]").await {
            debug!(url, error = %e, "No detail links rendered");
        }

        let value = page.evaluate(COLLECT_LINKS_SCRIPT).await?;
        let candidates: Vec<Candidate> =
            serde_json::from_value(value).context("Unexpected link collection result")?;

        let links = target_links(candidates);
        info!(url, count = links.len(), "Found properties in target neighborhoods");
        Ok(links)
    }

    async fn extract_property_details(
        &self,
        page: &dyn Page,
        url: &str,
        _metadata: &str,
        config: &ScrapeConfig,
    ) -> Result<Option<Listing>> {
        page.goto(url)
            .await
            .with_context(|| format!("Failed to open {url}"))?;
        page.wait_for_load().await?;
        page.wait_for_selector("h1").await?;

        let html = page.content().await?;
        let listing = parse_detail_page(&html, url, config);
        if listing.is_none() {
            debug!(url, "Outside target neighborhoods");
        }
        Ok(listing)
    }
}

/// Normalized candidates whose slug names a target neighborhood, deduplicated.
fn target_links(candidates: Vec<Candidate>) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for candidate in candidates {
        let Some(href) = normalize_url(&candidate.href, BASE_URL) else {
            continue;
        };
        let slug = href.rsplit('/').next().unwrap_or_default().to_lowercase();
        if slug_names_barrio(&slug) && !links.contains(&href) {
            links.push(href);
        }
    }
    links
}

fn slug_names_barrio(slug: &str) -> bool {
    UNIFIED_BARRIOS.iter().any(|(name, _)| {
        let lower = name.to_lowercase();
        slug.contains(&fold_accents(name).replace(' ', "-")) || slug.contains(&lower)
    })
}

/// First neighborhood mentioned in the title or, failing that, the page text.
fn detect_barrio(title: &str, text: &str) -> Option<&'static str> {
    let title = title.to_lowercase();
    let text = text.to_lowercase();
    UNIFIED_BARRIOS.iter().find_map(|(name, unified)| {
        let name = name.to_lowercase();
        (title.contains(&name) || text.contains(&name)).then_some(*unified)
    })
}

fn parse_detail_page(html: &str, url: &str, config: &ScrapeConfig) -> Option<Listing> {
    let document = Html::parse_document(html);
    let text = body_text(&document);

    let title = document
        .select(&selector("h1"))
        .next()
        .map(element_text)
        .unwrap_or_default();

    let location = detect_barrio(&title, &text)?;
    let features = extract_features_from_text(&text);

    let mut listing = Listing::new(url, SOURCE);
    listing.title = title;
    listing.location = location.to_string();
    listing.code = listing_code(url, &text);
    listing.area = features.area;
    listing.bedrooms = features.bedrooms;
    listing.bathrooms = features.bathrooms;
    listing.parking = features.parking;
    listing.estrato = features.estrato;
    listing.price = document
        .select(&selector(".price, .precio, .inmueble-precio"))
        .next()
        .map(element_text)
        .filter(|raw| raw.contains('$'))
        .unwrap_or(features.price);

    let gallery: Vec<&str> = document
        .select(&selector(".gallery img, .carousel img, .slider-pro img, .fotorama__img"))
        .filter_map(|img| img.value().attr("src"))
        .collect();
    let raw_images: Vec<String> = if gallery.is_empty() {
        document
            .select(&selector("img"))
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| src.contains("http"))
            .map(str::to_string)
            .collect()
    } else {
        gallery
            .into_iter()
            .filter_map(|src| normalize_url(src, url))
            .collect()
    };
    listing.images =
        filter_property_images(raw_images, &config.image_exclusions, config.max_images);

    let (latitude, longitude) = extract_gps_coordinates(html);
    listing.latitude = latitude;
    listing.longitude = longitude;

    Some(listing)
}

/// `LIV-<id>` from the trailing digits of the URL, else from a "Código" label.
fn listing_code(url: &str, text: &str) -> String {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    static LABEL: OnceLock<Regex> = OnceLock::new();

    let trailing =
        TRAILING.get_or_init(|| Regex::new(r"(\d+)$").expect("static pattern compiles"));
    let label = LABEL.get_or_init(|| {
        Regex::new(r"(?i)c[óo]digo[:\s]+(\d+)").expect("static pattern compiles")
    });

    trailing
        .captures(url)
        .or_else(|| label.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| format!("LIV-{}", m.as_str()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(href: &str) -> Candidate {
        Candidate {
            href: href.to_string(),
        }
    }

    #[test]
    fn test_search_inputs_are_per_price_range() {
        let inputs = Livinmobiliaria::new().get_search_inputs(&ScrapeConfig::default());
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].metadata, "Envigado");
        assert!(inputs[0].url.ends_with("&rango-precio=2500000-3500000"));
    }

    #[test]
    fn test_target_links_filter_by_slug() {
        let links = target_links(vec![
            candidate("/detalle-propiedad/apartamento-en-arriendo-en-la-magnolia-10234"),
            candidate("https://www.livinmobiliaria.com/detalle-propiedad/apartamento-en-zuniga-555"),
            candidate("/detalle-propiedad/apartamento-en-la-magnolia-10234"),
            candidate("/detalle-propiedad/apartamento-en-el-poblado-777"),
            candidate("/detalle-propiedad/apartamento-en-la-magnolia-10234#galeria"),
        ]);

        assert_eq!(
            links,
            vec![
                "https://www.livinmobiliaria.com/detalle-propiedad/apartamento-en-arriendo-en-la-magnolia-10234",
                "https://www.livinmobiliaria.com/detalle-propiedad/apartamento-en-zuniga-555",
                "https://www.livinmobiliaria.com/detalle-propiedad/apartamento-en-la-magnolia-10234",
            ]
        );
    }

    #[test]
    fn test_detail_page_outside_targets_is_skipped() {
        let html = "<html><body><h1>Apartamento en El Poblado</h1><p>Medellín</p></body></html>";
        let url = "https://www.livinmobiliaria.com/detalle-propiedad/apartamento-en-el-poblado-777";
        assert!(parse_detail_page(html, url, &ScrapeConfig::default()).is_none());
    }

    #[test]
    fn test_parse_detail_page() {
        let html = r#"
            <html><body>
              <h1>Apartamento en arriendo en La Abadía</h1>
              <div class="precio">$ 3.100.000</div>
              <ul>
                <li>Área construida: 90 m2</li>
                <li>Habitaciones: 3</li>
                <li>Baños: 2</li>
                <li>Parqueaderos: 1</li>
                <li>Estrato 5</li>
              </ul>
              <div class="gallery">
                <img src="https://cdn.livin.com/fotos/a.jpg">
                <img src="https://cdn.livin.com/logo.png">
                <img src="/fotos/b.jpg">
              </div>
              <a href="https://apps.mapbox.com/feedback/?owner=livin#/-75.5851/6.1663/16">Mapa</a>
            </body></html>
        "#;
        let url = "https://www.livinmobiliaria.com/detalle-propiedad/apartamento-en-la-abadia-4410";

        let listing = parse_detail_page(html, url, &ScrapeConfig::default()).unwrap();

        assert_eq!(listing.location, "La Abadia");
        assert_eq!(listing.code, "LIV-4410");
        assert_eq!(listing.price, "$ 3.100.000");
        assert_eq!(listing.area, "90");
        assert_eq!(listing.bedrooms, "3");
        assert_eq!(listing.bathrooms, "2");
        assert_eq!(listing.parking, "1");
        assert_eq!(listing.estrato, "5");
        assert_eq!(
            listing.images,
            vec![
                "https://cdn.livin.com/fotos/a.jpg",
                "https://www.livinmobiliaria.com/fotos/b.jpg",
            ]
        );
        assert_eq!(listing.latitude, Some(6.1663));
        assert_eq!(listing.longitude, Some(-75.5851));
        assert_eq!(listing.source, SOURCE);
    }

    #[test]
    fn test_code_from_text_label() {
        assert_eq!(
            listing_code("https://www.livinmobiliaria.com/detalle?id=x", "Código: 9981"),
            "LIV-9981"
        );
        assert_eq!(listing_code("https://www.livinmobiliaria.com/detalle", "sin código"), "");
    }
}
