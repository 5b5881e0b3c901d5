use crate::error::{Result, ScanError};
use crate::extract::{self, CAPTCHA_MARKUP, ENTRY, NEXT_LINKS, PARENT_HEADER_LINK};
use crate::result::{Publication, UNTITLED};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

const UNUSUAL_TRAFFIC_TEXT: &str = "unusual traffic from your computer network";

/// A parsed result page.
pub struct Page {
    url: Url,
    html: Html,
}

impl Page {
    pub fn parse(url: &str, body: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self {
            url,
            html: Html::parse_document(body),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn find_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }

    pub fn find_all(&self, selector: &Selector) -> Vec<ElementRef<'_>> {
        self.html.select(selector).collect()
    }

    /// Whether the page is an anti-bot interstitial instead of results.
    pub fn is_blocked(&self) -> bool {
        if self.find_first(&CAPTCHA_MARKUP).is_some() {
            return true;
        }
        element_text(self.html.root_element()).contains(UNUSUAL_TRAFFIC_TEXT)
    }

    /// Resolves a (usually root-relative) href against this page's url.
    pub fn resolve(&self, href: &str) -> Option<String> {
        if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
            return None;
        }
        let mut resolved = self.url.join(href).ok()?;
        resolved.set_fragment(None);
        Some(resolved.to_string())
    }

    /// The publication whose citers this page lists, if it is a citers-of
    /// view. Its id comes from this page's own `cluster`/`cites` parameter.
    pub fn parent_publication(&self) -> Option<Publication> {
        let header = self.find_first(&PARENT_HEADER_LINK)?;
        let Some(id) = extract::cluster_id(self.url.as_str()) else {
            debug!("Result header present but {} carries no cluster id", self.url);
            return None;
        };
        let title = element_text(header);
        let title = if title.is_empty() { UNTITLED.to_string() } else { title };
        Some(Publication::new(id, title))
    }

    /// Every result entry that resolves to a publication, in page order.
    pub fn publications(&self) -> Vec<Publication> {
        self.html
            .select(&ENTRY)
            .filter_map(|entry| {
                let publication = extract::extract_publication(entry, self);
                if publication.is_none() {
                    debug!("Skipping result entry without a cluster id on {}", self.url);
                }
                publication
            })
            .collect()
    }

    /// Absolute url of the "Next" pagination link.
    pub fn next_page_url(&self) -> Option<String> {
        self.html
            .select(&NEXT_LINKS)
            .find(|link| element_text(*link).contains("Next"))
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| self.resolve(href))
    }
}

/// Rendered text of an element with whitespace runs collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
