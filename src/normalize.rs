//! Text and link normalization helpers
//!
//! Whitespace cleanup for extracted field values, and resolution of candidate
//! hrefs into canonical identifiers that stay on the harvested site.

use std::collections::HashSet;
use url::Url;

/// Collapses whitespace runs and non-breaking spaces into single ASCII spaces
pub fn collapse_ws(value: &str) -> String {
    value
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a candidate href against the base URL and canonicalizes it
///
/// Returns None if the candidate is empty, uses a non-HTTP scheme, or leaves
/// the allowed hosts. Fragments are dropped so that two links to the same
/// page collapse into one identifier.
pub fn normalize_link(
    candidate: &str,
    base: &Url,
    allowed_hosts: &HashSet<String>,
) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate.starts_with('#') {
        return None;
    }

    let mut url = base.join(candidate).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?;
    if !allowed_hosts.contains(host) {
        return None;
    }

    url.set_fragment(None);
    Some(url.into())
}

/// Builds the allowed-host set for a site: the base host and its `www.` twin
pub fn allowed_hosts(base: &Url) -> HashSet<String> {
    let mut hosts = HashSet::new();
    if let Some(host) = base.host_str() {
        hosts.insert(host.to_string());
        match host.strip_prefix("www.") {
            Some(bare) => hosts.insert(bare.to_string()),
            None => hosts.insert(format!("www.{}", host)),
        };
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://1000.menu").unwrap()
    }

    fn hosts() -> HashSet<String> {
        allowed_hosts(&base())
    }

    #[test]
    fn test_collapse_ws_basic() {
        assert_eq!(collapse_ws("  a   b\t\nc  "), "a b c");
    }

    #[test]
    fn test_collapse_ws_nbsp() {
        assert_eq!(collapse_ws("a\u{a0}b"), "a b");
    }

    #[test]
    fn test_collapse_ws_empty() {
        assert_eq!(collapse_ws(""), "");
        assert_eq!(collapse_ws("   "), "");
    }

    #[test]
    fn test_normalize_relative_link() {
        let link = normalize_link("/cooking/1234-borscht", &base(), &hosts());
        assert_eq!(
            link.as_deref(),
            Some("https://1000.menu/cooking/1234-borscht")
        );
    }

    #[test]
    fn test_normalize_absolute_link_on_www_twin() {
        let link = normalize_link("https://www.1000.menu/cooking/1", &base(), &hosts());
        assert_eq!(link.as_deref(), Some("https://www.1000.menu/cooking/1"));
    }

    #[test]
    fn test_normalize_drops_fragment() {
        let link = normalize_link("/cooking/1#comments", &base(), &hosts());
        assert_eq!(link.as_deref(), Some("https://1000.menu/cooking/1"));
    }

    #[test]
    fn test_normalize_rejects_foreign_host() {
        assert_eq!(
            normalize_link("https://other.example/cooking/1", &base(), &hosts()),
            None
        );
    }

    #[test]
    fn test_normalize_rejects_non_http_schemes() {
        assert_eq!(normalize_link("mailto:a@b.c", &base(), &hosts()), None);
        assert_eq!(normalize_link("javascript:void(0)", &base(), &hosts()), None);
    }

    #[test]
    fn test_normalize_rejects_empty_and_fragment_only() {
        assert_eq!(normalize_link("", &base(), &hosts()), None);
        assert_eq!(normalize_link("#top", &base(), &hosts()), None);
    }

    #[test]
    fn test_allowed_hosts_includes_www_twin() {
        let hosts = hosts();
        assert!(hosts.contains("1000.menu"));
        assert!(hosts.contains("www.1000.menu"));
    }

    #[test]
    fn test_allowed_hosts_from_www_base() {
        let hosts = allowed_hosts(&Url::parse("https://www.example.com").unwrap());
        assert!(hosts.contains("www.example.com"));
        assert!(hosts.contains("example.com"));
    }
}
