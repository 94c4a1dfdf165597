use crate::models::Listing;
use crate::scrapers::browser::Page;
use crate::scrapers::helpers::{element_text, filter_property_images, normalize_url, selector};
use crate::scrapers::traits::SiteAdapter;
use crate::scrapers::types::{ScrapeConfig, SearchInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use tracing::{debug, info};

pub const SOURCE: &str = "arrendamientos_envigado";

const BASE_URL: &str = "https://www.arrendamientosenvigadosa.com.co/";
const SEARCH_URL: &str = "https://www.arrendamientosenvigadosa.com.co/busqueda.html?servicio=Arriendo&tipo=1&ciudad=25999";

/// Neighborhood name and the site's internal id for it
const BARRIOS: &[(&str, &str)] = &[
    ("El Portal", "6822"),
    ("Jardines", "6824"),
    ("La Abadia", "8807"),
    ("La Frontera", "8808"),
    ("La Magnolia", "6843"),
    ("Las Flores", "6848"),
    ("Las Vegas", "6816"),
    ("Loma Benedictinos", "8585"),
    ("Pontevedra", "6844"),
    ("San Marcos", "6823"),
    ("Villagrande", "6825"),
    ("Zuñiga", "8579"),
];

/// Site watermark and layout assets mixed into the carousel
const CAROUSEL_NOISE: &[&str] = &["logo-ae-new.png", "assets/"];

/// Arrendamientos Envigado S.A. (arrendamientosenvigadosa.com.co)
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrendamientosEnvigado;

impl ArrendamientosEnvigado {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteAdapter for ArrendamientosEnvigado {
    fn name(&self) -> &str {
        "Arrendamientos Envigado"
    }

    fn source(&self) -> &str {
        SOURCE
    }

    fn get_search_inputs(&self, config: &ScrapeConfig) -> Vec<SearchInput> {
        BARRIOS
            .iter()
            .flat_map(|(barrio, id)| {
                config.price_ranges.iter().map(move |range| {
                    SearchInput::new(
                        format!(
                            "{SEARCH_URL}&barrio={id}&valmin={}&valmax={}",
                            range.min, range.max
                        ),
                        *barrio,
                    )
                })
            })
            .collect()
    }

    async fn extract_links_from_search_page(
        &self,
        page: &dyn Page,
        url: &str,
    ) -> Result<Vec<String>> {
        page.goto(url).await?;
        if let Err(e) = page.wait_for_load().await {
            debug!(url, error = %e, "Load state not reached, continuing");
        }

        // An empty result page never renders any card
        if page.wait_for_selector("a.link-footer-black").await.is_err() {
            info!(url, "No results on search page");
            return Ok(Vec::new());
        }

        let html = page.content().await?;
        let links = parse_search_links(&html);
        info!(url, count = links.len(), "Found properties on search page");
        Ok(links)
    }

    async fn extract_property_details(
        &self,
        page: &dyn Page,
        url: &str,
        metadata: &str,
        config: &ScrapeConfig,
    ) -> Result<Option<Listing>> {
        page.goto(url)
            .await
            .with_context(|| format!("Failed to open {url}"))?;
        page.wait_for_load().await?;
        if let Err(e) = page.wait_for_selector("div.lux-grey.bold").await {
            debug!(url, error = %e, "Title block missing");
        }

        let html = page.content().await?;
        Ok(Some(parse_detail_page(&html, url, metadata, config)))
    }
}

/// Detail links of a search result page, absolute and without duplicates.
fn parse_search_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let cards = selector("a.link-footer-black");

    let mut links: Vec<String> = Vec::new();
    for card in document.select(&cards) {
        let Some(href) = card.value().attr("href") else {
            continue;
        };
        if !href.contains("inmueble.html") {
            continue;
        }
        let link = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{BASE_URL}{}", href.trim_start_matches('/'))
        };
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

fn parse_detail_page(html: &str, url: &str, barrio: &str, config: &ScrapeConfig) -> Listing {
    let document = Html::parse_document(html);
    let mut listing = Listing::new(url, SOURCE);

    listing.title = document
        .select(&selector("div.lux-grey.bold > span.bold"))
        .next()
        .map(element_text)
        .unwrap_or_default();
    listing.location = barrio.trim().to_string();
    listing.code = code_from_url(url);

    listing.price = list_value(&document, "Precio");
    listing.area = list_value(&document, "Área");
    listing.estrato = list_value(&document, "Estrato");
    listing.bedrooms = list_value(&document, "Alcobas");
    listing.bathrooms = list_value(&document, "Baños");
    listing.parking = list_value(&document, "Parqueadero");
    listing.description = description(&document);

    if listing.bedrooms.is_empty() {
        listing.bedrooms = value_by_icon(&document, "bed");
    }
    if listing.bathrooms.is_empty() {
        listing.bathrooms = value_by_icon(&document, "bathtub");
    }
    if listing.parking.is_empty() {
        listing.parking = value_by_icon(&document, "car");
    }
    fill_from_description(&mut listing);

    let sources: Vec<String> = document
        .select(&selector(".carousel-item img"))
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !CAROUSEL_NOISE.iter().any(|noise| src.contains(noise)))
        .filter_map(|src| normalize_url(src, url))
        .collect();
    listing.images = filter_property_images(sources, &config.image_exclusions, config.max_images);

    listing
}

/// Value span of the `li.list-group-item` whose spans mention `label`.
fn list_value(document: &Html, label: &str) -> String {
    let items = selector("li.list-group-item");
    let spans = selector("span");

    for item in document.select(&items) {
        let texts: Vec<String> = item.select(&spans).map(element_text).collect();
        if texts.len() >= 2 && texts.iter().any(|t| t.contains(label)) {
            return texts[1].clone();
        }
    }
    String::new()
}

/// The paragraph that follows the "DESCRIPCIÓN" heading paragraph.
fn description(document: &Html) -> String {
    let paragraphs = selector("p");
    document
        .select(&paragraphs)
        .find(|p| element_text(*p).contains("DESCRIPCIÓN"))
        .and_then(|heading| {
            heading
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sibling| sibling.value().name() == "p")
        })
        .map(element_text)
        .unwrap_or_default()
}

fn value_by_icon(document: &Html, icon: &str) -> String {
    let css = format!("img[src*=\"{icon}\"] ~ span");
    document
        .select(&selector(&css))
        .next()
        .map(element_text)
        .unwrap_or_default()
}

fn fill_from_description(listing: &mut Listing) {
    static BEDROOMS: OnceLock<Regex> = OnceLock::new();
    static BATHROOMS: OnceLock<Regex> = OnceLock::new();
    static PARKING: OnceLock<Regex> = OnceLock::new();

    let capture = |cell: &'static OnceLock<Regex>, pattern: &str| -> String {
        cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
            .captures(&listing.description)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    let bedrooms = capture(&BEDROOMS, r"(?i)(\d+)\s*(?:alcobas|habitaciones)");
    let bathrooms = capture(&BATHROOMS, r"(?i)(\d+)\s*baños");
    let parking = capture(&PARKING, r"(?i)(\d+)\s*parqueaderos?");

    if listing.bedrooms.is_empty() {
        listing.bedrooms = bedrooms;
    }
    if listing.bathrooms.is_empty() {
        listing.bathrooms = bathrooms;
    }
    if listing.parking.is_empty() {
        listing.parking = if !parking.is_empty() {
            parking
        } else if listing.description.to_lowercase().contains("parqueadero") {
            "1".to_string()
        } else {
            String::new()
        };
    }
}

fn code_from_url(url: &str) -> String {
    static CODE: OnceLock<Regex> = OnceLock::new();
    CODE.get_or_init(|| Regex::new(r"(?:codigo|inmueble)=(\d+)").expect("static pattern compiles"))
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
