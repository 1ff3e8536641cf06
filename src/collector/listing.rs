//! Search-listing parsing: recipe-card links and the next-page endpoint
//!
//! The site renders search results as cards and loads further pages through
//! an AJAX endpoint whose URL template is embedded in the first page's
//! markup. Both pagination strategies share the card extraction here.

use crate::normalize::normalize_link;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Card anchors that carry recipe links on listing pages
const CARD_SELECTORS: [&str; 3] = [
    "#recipes a.h5[href]",
    ".cn-item a.h5[href]",
    "a.recipe-card[href]",
];

fn next_page_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"cook_load_next_page_html\('([^']+)'").expect("valid next-page pattern")
    })
}

/// Extracts recipe links from a listing page, in document order, deduplicated
///
/// Links are normalized against the base URL, restricted to the allowed
/// hosts, and filtered to the recipe path prefix.
pub fn extract_listing_links(
    html: &str,
    base: &Url,
    allowed_hosts: &HashSet<String>,
    path_prefix: &str,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    for selector_str in CARD_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(normalized) = normalize_link(href, base, allowed_hosts) else {
                continue;
            };
            let on_prefix = Url::parse(&normalized)
                .map(|u| u.path().starts_with(path_prefix))
                .unwrap_or(false);
            if on_prefix && seen.insert(normalized.clone()) {
                links.push(normalized);
            }
        }
    }

    links
}

/// Finds the AJAX next-page URL template embedded in the first listing page
pub fn find_next_page_template(html: &str) -> Option<String> {
    next_page_re()
        .captures(html)
        .map(|caps| caps[1].to_string())
}

/// Resolves the AJAX template and points it at the given page number
pub fn build_endpoint_url(
    template: &str,
    base: &Url,
    page: u64,
) -> Result<String, url::ParseError> {
    let mut url = base.join(template)?;
    set_page_param(&mut url, page);
    Ok(url.into())
}

/// Builds a direct listing-page URL from the search path
pub fn build_paged_url(
    base: &Url,
    search_path: &str,
    page: u64,
) -> Result<String, url::ParseError> {
    let mut url = base.join(search_path)?;
    set_page_param(&mut url, page);
    Ok(url.into())
}

fn set_page_param(url: &mut Url, page: u64) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut editor = url.query_pairs_mut();
    editor.clear();
    let mut replaced = false;
    for (key, value) in pairs {
        if key == "p" {
            editor.append_pair("p", &page.to_string());
            replaced = true;
        } else {
            editor.append_pair(&key, &value);
        }
    }
    if !replaced {
        editor.append_pair("p", &page.to_string());
    }
}
