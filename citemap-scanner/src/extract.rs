//! Reads publication metadata out of a rendered result entry.

use crate::page::{Page, element_text};
use crate::result::{Publication, UNTITLED};
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("selector literal is valid CSS")
}

pub(crate) static ENTRY: LazyLock<Selector> = LazyLock::new(|| selector("#gs_res_ccl_mid .gs_r"));
pub(crate) static PARENT_HEADER_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector("#gs_res_ccl_top a"));
pub(crate) static NEXT_LINKS: LazyLock<Selector> = LazyLock::new(|| selector("#gs_n a"));
pub(crate) static CAPTCHA_MARKUP: LazyLock<Selector> =
    LazyLock::new(|| selector("#gs_captcha_ccl, #recaptcha, #captcha-form"));

static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".gs_rt"));
static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".gs_rt a"));
static META: LazyLock<Selector> = LazyLock::new(|| selector(".gs_a"));
static ACTION_LINKS: LazyLock<Selector> = LazyLock::new(|| selector(".gs_fl a"));

static CITED_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Cited by (\d+)").expect("regex literal is valid"));
static META_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s[-\x{2013}]\s").expect("regex literal is valid"));
static BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("regex literal is valid"));

/// Query parameters carrying a cluster id, in order of preference.
const CLUSTER_PARAMS: [&str; 2] = ["cluster", "cites"];

/// Extracts the cluster id from an absolute or root-relative url.
///
/// `cluster` wins over `cites`; empty values count as absent.
pub fn cluster_id(url: &str) -> Option<String> {
    let base = Url::parse("http://relative.invalid/").ok()?;
    let parsed = base.join(url).ok()?;

    CLUSTER_PARAMS.iter().find_map(|param| {
        parsed
            .query_pairs()
            .find(|(key, value)| key.as_ref() == *param && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    })
}

/// Splits a citation line such as `"J. Doe, A. Smith - Nature, 2020 - nature.com"`
/// into `(authors, source, year)`.
///
/// Only the first two separated parts are used. The year is whatever follows
/// the last comma of the source, or the whole source when it has no comma.
pub fn parse_meta(meta: &str) -> (String, Option<String>, Option<String>) {
    let mut parts = META_SEPARATOR.split(meta);
    let authors = parts.next().unwrap_or_default().to_string();
    let source = parts.next().map(str::to_string);

    let year = source.as_ref().map(|source| match source.rsplit_once(',') {
        Some((_, year)) => year.trim().to_string(),
        None => source.clone(),
    });

    (authors, source, year)
}

/// Turns one result entry into a publication, or `None` when the entry has
/// no resolvable id ("all versions" groupings and the like).
pub fn extract_publication(entry: ElementRef<'_>, page: &Page) -> Option<Publication> {
    let id = resolve_id(entry)?;

    let title_link = entry.select(&TITLE_LINK).next();
    let url = title_link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| page.resolve(href));
    let title = title_link
        .map(element_text)
        .filter(|t| !t.is_empty())
        .or_else(|| bare_title(entry))
        .unwrap_or_else(|| UNTITLED.to_string());

    let (authors, year) = match entry.select(&META).next() {
        Some(meta) => {
            let (authors, _source, year) = parse_meta(&element_text(meta));
            (Some(authors).filter(|a| !a.is_empty()), year)
        }
        None => (None, None),
    };

    let mut publication = Publication::new(id, title);
    publication.url = url;
    publication.authors = authors;
    publication.year = year;

    if let Some(link) = entry
        .select(&ACTION_LINKS)
        .find(|a| element_text(*a).contains("Cited by"))
    {
        publication.cited_by = CITED_BY
            .captures(&element_text(link))
            .and_then(|caps| caps[1].parse().ok());
        publication.cited_by_url = link.value().attr("href").and_then(|href| page.resolve(href));
    }

    Some(publication)
}

fn resolve_id(entry: ElementRef<'_>) -> Option<String> {
    let from_link = entry
        .select(&ACTION_LINKS)
        .find(|a| {
            let text = element_text(*a);
            text.contains("Cited by") || text.contains("versions")
        })
        .and_then(|a| a.value().attr("href"))
        .and_then(cluster_id);

    from_link.or_else(|| {
        entry
            .value()
            .attr("data-cid")
            .filter(|cid| !cid.is_empty())
            .map(str::to_string)
    })
}

/// Title text of an unlinked heading, minus tags like `[CITATION]`.
fn bare_title(entry: ElementRef<'_>) -> Option<String> {
    let heading = element_text(entry.select(&TITLE).next()?);
    let stripped = BRACKET_TAG.replace_all(&heading, "");
    let title = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_entry(body: &str) -> Option<Publication> {
        let html = format!(r#"<html><body><div id="gs_res_ccl_mid">{}</div></body></html>"#, body);
        let page = Page::parse("https://scholar.example/scholar?q=test", &html).unwrap();
        page.find_first(&ENTRY)
            .and_then(|entry| extract_publication(entry, &page))
    }

    #[test]
    fn test_cluster_id_from_cluster_param() {
        assert_eq!(
            cluster_id("https://scholar.example/scholar?cluster=12345&hl=en"),
            Some("12345".to_string())
        );
    }

    #[test]
    fn test_cluster_id_from_cites_param() {
        assert_eq!(cluster_id("/scholar?cites=999&as_sdt=5"), Some("999".to_string()));
    }

    #[test]
    fn test_cluster_id_prefers_cluster_over_cites() {
        assert_eq!(cluster_id("/scholar?cites=1&cluster=2"), Some("2".to_string()));
    }

    #[test]
    fn test_cluster_id_absent() {
        assert_eq!(cluster_id("https://scholar.example/scholar?q=graphs"), None);
        assert_eq!(cluster_id("/scholar?cluster="), None);
    }

    #[test]
    fn test_parse_meta_with_source_and_year() {
        let (authors, source, year) = parse_meta("J. Doe, A. Smith - Nature, 2020");
        assert_eq!(authors, "J. Doe, A. Smith");
        assert_eq!(source.as_deref(), Some("Nature, 2020"));
        assert_eq!(year.as_deref(), Some("2020"));
    }

    #[test]
    fn test_parse_meta_ignores_host_part() {
        let (authors, _, year) = parse_meta("J. Doe - Nature, 2020 - nature.com");
        assert_eq!(authors, "J. Doe");
        assert_eq!(year.as_deref(), Some("2020"));
    }

    #[test]
    fn test_parse_meta_en_dash_separator() {
        let (authors, _, year) = parse_meta("J. Doe \u{2013} Science, 1999");
        assert_eq!(authors, "J. Doe");
        assert_eq!(year.as_deref(), Some("1999"));
    }

    #[test]
    fn test_parse_meta_source_without_comma() {
        let (_, source, year) = parse_meta("J. Doe - 2021");
        assert_eq!(source.as_deref(), Some("2021"));
        assert_eq!(year.as_deref(), Some("2021"));
    }

    #[test]
    fn test_parse_meta_without_separator() {
        let (authors, source, year) = parse_meta("J. Doe, A. Smith");
        assert_eq!(authors, "J. Doe, A. Smith");
        assert_eq!(source, None);
        assert_eq!(year, None);
    }

    #[test]
    fn test_parse_meta_keeps_hyphenated_names() {
        let (authors, _, year) = parse_meta("J. Doe-Smith - Cell, 2001");
        assert_eq!(authors, "J. Doe-Smith");
        assert_eq!(year.as_deref(), Some("2001"));
    }

    #[test]
    fn test_extract_full_entry() {
        let publication = first_entry(
            r#"<div class="gs_r" data-cid="raw">
                <h3 class="gs_rt"><a href="https://pubs.example/paper">A   Paper</a></h3>
                <div class="gs_a">J. Doe, A. Smith - Nature, 2020 - nature.com</div>
                <div class="gs_fl">
                    <a href="/scholar?cites=111&amp;hl=en">Cited by 42</a>
                    <a href="/scholar?cluster=111">All 3 versions</a>
                </div>
            </div>"#,
        )
        .unwrap();

        assert_eq!(publication.id, "111");
        assert_eq!(publication.title, "A Paper");
        assert_eq!(publication.url.as_deref(), Some("https://pubs.example/paper"));
        assert_eq!(publication.authors.as_deref(), Some("J. Doe, A. Smith"));
        assert_eq!(publication.year.as_deref(), Some("2020"));
        assert_eq!(publication.cited_by, Some(42));
        assert_eq!(
            publication.cited_by_url.as_deref(),
            Some("https://scholar.example/scholar?cites=111&hl=en")
        );
    }

    #[test]
    fn test_link_id_takes_precedence_over_raw_attribute() {
        let publication = first_entry(
            r#"<div class="gs_r" data-cid="222">
                <h3 class="gs_rt"><a href="https://pubs.example/p">P</a></h3>
                <div class="gs_fl"><a href="/scholar?cluster=111">Cited by 5</a></div>
            </div>"#,
        )
        .unwrap();
        assert_eq!(publication.id, "111");
    }

    #[test]
    fn test_versions_link_supplies_id() {
        let publication = first_entry(
            r#"<div class="gs_r">
                <h3 class="gs_rt"><a href="https://pubs.example/p">P</a></h3>
                <div class="gs_fl"><a href="/scholar?cluster=333">All 7 versions</a></div>
            </div>"#,
        )
        .unwrap();
        assert_eq!(publication.id, "333");
        assert_eq!(publication.cited_by, None);
        assert_eq!(publication.cited_by_url, None);
    }

    #[test]
    fn test_raw_attribute_used_without_links() {
        let publication = first_entry(
            r#"<div class="gs_r" data-cid="abcDEF">
                <h3 class="gs_rt"><a href="https://pubs.example/p">P</a></h3>
                <div class="gs_a">Solo Author</div>
            </div>"#,
        )
        .unwrap();
        assert_eq!(publication.id, "abcDEF");
        assert_eq!(publication.authors.as_deref(), Some("Solo Author"));
        assert_eq!(publication.year, None);
    }

    #[test]
    fn test_entry_without_id_is_skipped() {
        let publication = first_entry(
            r#"<div class="gs_r">
                <h3 class="gs_rt"><a href="https://pubs.example/p">P</a></h3>
                <div class="gs_fl"><a href="/scholar?q=related">Related articles</a></div>
            </div>"#,
        );
        assert!(publication.is_none());
    }

    #[test]
    fn test_unlinked_title_drops_bracket_tags() {
        let publication = first_entry(
            r#"<div class="gs_r" data-cid="9">
                <h3 class="gs_rt"><span>[CITATION]</span> Old Book</h3>
            </div>"#,
        )
        .unwrap();
        assert_eq!(publication.title, "Old Book");
        assert_eq!(publication.url, None);
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let publication = first_entry(r#"<div class="gs_r" data-cid="9"></div>"#).unwrap();
        assert_eq!(publication.title, UNTITLED);
    }

    #[test]
    fn test_cited_by_without_count_keeps_url() {
        let publication = first_entry(
            r#"<div class="gs_r" data-cid="9">
                <div class="gs_fl"><a href="/scholar?cites=9">Cited by</a></div>
            </div>"#,
        )
        .unwrap();
        assert_eq!(publication.id, "9");
        assert_eq!(publication.cited_by, None);
        assert_eq!(
            publication.cited_by_url.as_deref(),
            Some("https://scholar.example/scholar?cites=9")
        );
    }
}
