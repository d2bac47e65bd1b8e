//! Adapter for sources scraped directly from their HTML listing index.
//!
//! Expects the common card markup listing sites render server-side: one
//! element per listing (default selector `.listing-card`, overridable per
//! source) carrying a `data-listing-id` attribute, a detail link, and
//! `.address` / `.unit` / `.neighborhood` / `.borough` / `.price` /
//! `.beds` / `.baths` children. Pagination follows `rel="next"` links;
//! page tokens are absolute URLs.

use roost_core::adapter::{FetchPage, RawItem, SourceAdapter};
use roost_core::error::AppError;
use roost_core::listing::NewListing;
use roost_core::source::{SourceConfig, SourceKind};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use crate::http::HttpFetcher;
use crate::parse::normalize_raw_item;
use crate::robots::RobotsCache;

const DEFAULT_ITEM_SELECTOR: &str = ".listing-card";

#[derive(Clone, Debug)]
pub struct DirectHtmlAdapter {
    http: HttpFetcher,
    robots: RobotsCache,
}

impl DirectHtmlAdapter {
    pub fn new(http: HttpFetcher) -> Self {
        let robots = RobotsCache::new(http.clone());
        Self { http, robots }
    }
}

impl SourceAdapter for DirectHtmlAdapter {
    async fn fetch_page(
        &self,
        source: &SourceConfig,
        page_token: Option<&str>,
    ) -> Result<FetchPage, AppError> {
        let SourceKind::DirectHtml {
            list_url,
            item_selector,
        } = &source.kind
        else {
            return Err(AppError::ConfigError(format!(
                "source '{}' is not a direct-html source",
                source.id
            )));
        };

        let page_url = page_token.unwrap_or(list_url);
        if !self.robots.is_allowed(page_url).await? {
            return Err(AppError::HttpError(format!(
                "robots.txt disallows fetching {page_url}"
            )));
        }

        let html = self.http.get_text(page_url).await?;
        let selector = item_selector.as_deref().unwrap_or(DEFAULT_ITEM_SELECTOR);
        let (items, next_page_token) = parse_listing_page(&html, page_url, selector)?;

        tracing::debug!(
            source_id = %source.id,
            url = %page_url,
            items = items.len(),
            has_next = next_page_token.is_some(),
            "Parsed listing page"
        );

        Ok(FetchPage {
            items,
            next_page_token,
        })
    }

    fn normalize(&self, source: &SourceConfig, raw: &RawItem) -> Result<NewListing, AppError> {
        normalize_raw_item(&source.id, raw)
    }
}

/// Extract listing cards and the next-page link from an index page.
///
/// Parsing is synchronous and self-contained: `scraper::Html` is not
/// Send, so it must never be held across an await point.
fn parse_listing_page(
    html: &str,
    page_url: &str,
    item_selector: &str,
) -> Result<(Vec<RawItem>, Option<String>), AppError> {
    let base = Url::parse(page_url)
        .map_err(|e| AppError::HttpError(format!("Invalid page URL {page_url}: {e}")))?;
    let card_sel = selector(item_selector)?;
    let link_sel = selector("a")?;
    let img_sel = selector("img")?;
    let next_sel = selector(r#"a[rel="next"]"#)?;

    let field_sels = [
        ("address", selector(".address")?),
        ("unit", selector(".unit")?),
        ("neighborhood", selector(".neighborhood")?),
        ("borough", selector(".borough")?),
        ("price", selector(".price")?),
        ("beds", selector(".beds")?),
        ("baths", selector(".baths")?),
    ];

    let doc = Html::parse_document(html);
    let mut items = Vec::new();

    for card in doc.select(&card_sel) {
        let mut obj = serde_json::Map::new();

        if let Some(id) = card.value().attr("data-listing-id") {
            obj.insert("id".into(), Value::String(id.to_string()));
        }

        if let Some(href) = card
            .select(&link_sel)
            .find_map(|a| a.value().attr("href"))
            && let Ok(absolute) = base.join(href)
        {
            obj.insert("url".into(), Value::String(absolute.to_string()));
        }

        for (name, sel) in &field_sels {
            if let Some(text) = text_of(card, sel) {
                obj.insert((*name).into(), Value::String(text));
            }
        }

        let images: Vec<Value> = card
            .select(&img_sel)
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| base.join(src).ok())
            .map(|u| Value::String(u.to_string()))
            .collect();
        if !images.is_empty() {
            obj.insert("images".into(), Value::Array(images));
        }

        items.push(Value::Object(obj));
    }

    let next_page_token = doc
        .select(&next_sel)
        .find_map(|a| a.value().attr("href"))
        .and_then(|href| base.join(href).ok())
        .map(|u| u.to_string());

    Ok((items, next_page_token))
}

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::ParseError(format!("invalid selector {css:?}: {e}")))
}

fn text_of(card: ElementRef<'_>, sel: &Selector) -> Option<String> {
    card.select(sel).next().and_then(|el| {
        let text: String = el.text().collect::<String>().trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    })
}
