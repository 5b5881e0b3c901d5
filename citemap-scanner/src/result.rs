use serde::{Deserialize, Serialize};

/// Title used when a result entry exposes no readable title.
pub const UNTITLED: &str = "Untitled";

/// Metadata for one publication as read from a result page.
///
/// `id` is the search engine's cluster id. Every other field is best-effort;
/// parent publications read from a citers-of header only carry a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub authors: Option<String>,
    pub year: Option<String>,
    pub cited_by: Option<u64>,
    pub cited_by_url: Option<String>,
}

impl Publication {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: None,
            authors: None,
            year: None,
            cited_by: None,
            cited_by_url: None,
        }
    }
}

/// One step of the walk: `from` cites `to`. `to` is `None` for entries on a
/// plain search page, which has no parent publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationPair {
    pub from: Publication,
    pub to: Option<Publication>,
}
