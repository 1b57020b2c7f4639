// URL canonicalization for frontier deduplication

use url::Url;

/// Resolve `href` against `base` and canonicalize it.
///
/// Returns `None` when either side fails to parse; callers drop the URL.
pub fn normalize_link(base: &str, href: &str) -> Option<String> {
    let base_url = Url::parse(base).ok()?;
    let resolved = base_url.join(href.trim()).ok()?;
    canonicalize(&resolved)
}

/// Canonicalize an absolute URL.
pub fn normalize_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    canonicalize(&parsed)
}

fn canonicalize(url: &Url) -> Option<String> {
    let scheme = match url.scheme() {
        "http" | "https" => "https",
        other => other,
    };

    let Some(host) = url.host_str() else {
        // Opaque URLs (mailto:, tel:, data:) have no host; keep them
        // recognisable so the filter can reject them by scheme.
        let mut opaque = url.clone();
        opaque.set_query(None);
        opaque.set_fragment(None);
        return Some(opaque.to_string());
    };

    let lowered = host.to_lowercase();
    let host = strip_www(&lowered);
    if host.is_empty() {
        return None;
    }

    let port = url
        .port()
        .filter(|p| !(scheme == "https" && *p == 443))
        .map(|p| format!(":{}", p))
        .unwrap_or_default();
    // Query strings are dropped, so pages differing only by query merge.
    let path = canonical_path(url.path());

    Some(format!("{}://{}{}{}", scheme, host, port, path))
}

fn canonical_path(path: &str) -> &str {
    if path.is_empty() || path == "/" {
        return "/";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Host of a URL with every leading `www.` removed, lower-cased.
pub fn site_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(strip_www(&host).to_string())
}

/// Strip `www.` labels until none lead, so the result is a fixed point.
fn strip_www(host: &str) -> &str {
    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    host
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrades_http_to_https() {
        assert_eq!(
            normalize_url("http://example.com/page").as_deref(),
            Some("https://example.com/page")
        );
    }

    #[test]
    fn test_strips_www_and_lowercases_host() {
        assert_eq!(
            normalize_url("https://WWW.Example.COM/About").as_deref(),
            Some("https://example.com/About")
        );
    }

    #[test]
    fn test_strips_query_fragment_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.com/news/?page=2#top").as_deref(),
            Some("https://example.com/news")
        );
    }

    #[test]
    fn test_empty_path_becomes_root() {
        assert_eq!(
            normalize_url("https://example.com").as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(
            normalize_url("https://example.com//").as_deref(),
            Some("https://example.com/")
        );
    }

    #[test]
    fn test_keeps_non_default_port() {
        assert_eq!(
            normalize_url("http://localhost:8080/app/").as_deref(),
            Some("https://localhost:8080/app")
        );
    }

    #[test]
    fn test_resolves_relative_links() {
        assert_eq!(
            normalize_link("https://example.com/uit/", "services/").as_deref(),
            Some("https://example.com/uit/services")
        );
        assert_eq!(
            normalize_link("https://example.com/uit/page", "../about").as_deref(),
            Some("https://example.com/about")
        );
    }

    #[test]
    fn test_unparseable_input_is_dropped() {
        assert_eq!(normalize_url("not a url"), None);
        assert_eq!(normalize_link("also not a url", "/page"), None);
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "http://www.example.com/a/b/?x=1",
            "https://example.com",
            "https://example.com//",
            "http://example.com:8443/x%20y/",
            "mailto:someone@example.com?subject=hi",
            "https://www.www.example.com/a",
        ];
        for sample in samples {
            let once = normalize_url(sample).unwrap();
            let twice = normalize_url(&once).unwrap();
            assert_eq!(once, twice, "normalization of {} is not idempotent", sample);
        }
    }

    #[test]
    fn test_scheme_variants_collapse() {
        assert_eq!(
            normalize_url("http://example.com/x"),
            normalize_url("https://example.com/x")
        );
    }

    #[test]
    fn test_repeated_www_labels_are_all_stripped() {
        assert_eq!(
            normalize_url("https://www.www.example.com/a").as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(
            site_host("https://WWW.www.example.com/").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn test_site_host() {
        assert_eq!(site_host("https://www.Example.com/x").as_deref(), Some("example.com"));
        assert_eq!(site_host("nonsense"), None);
    }
}
