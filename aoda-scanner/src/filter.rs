// Frontier eligibility rules

use crate::normalize::site_host;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Path suffixes that never lead to an HTML page.
pub const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".css", ".js", ".zip", ".doc", ".docx",
    ".xls", ".xlsx", ".mp4", ".mp3", ".avi", ".mov", ".wmv", ".xml", ".json", ".ico", ".woff",
    ".woff2", ".ttf", ".eot",
];

/// Prefixes of links that are not crawlable documents.
pub const SKIP_PREFIXES: &[&str] = &["mailto:", "tel:", "javascript:", "#", "data:"];

/// Crawl policy derived once from the seed URL at scan start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlPolicy {
    pub seed_host: String,
    pub start_path: String,
    pub same_domain_only: bool,
    pub restrict_to_path: bool,
}

impl CrawlPolicy {
    /// Build the policy for a seed. Fails closed: an unparseable seed yields
    /// `None` and the caller must reject the scan request.
    pub fn from_seed(seed: &str, same_domain_only: bool, restrict_to_path: bool) -> Option<Self> {
        let parsed = Url::parse(seed).ok()?;
        let seed_host = site_host(seed)?;
        let start_path = parsed.path().trim_end_matches('/').to_string();

        Some(Self {
            seed_host,
            start_path,
            same_domain_only,
            restrict_to_path,
        })
    }

    /// Decide whether a normalized URL may enter the frontier.
    pub fn allows(&self, url: &str) -> bool {
        let lowered = url.to_lowercase();
        if SKIP_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
            debug!("Skipping {} - non-crawlable prefix", url);
            return false;
        }

        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        if !matches!(parsed.scheme(), "http" | "https") {
            debug!("Skipping {} - scheme {}", url, parsed.scheme());
            return false;
        }

        if self.same_domain_only {
            match site_host(url) {
                Some(host) if host == self.seed_host => {}
                Some(host) => {
                    debug!("Skipping {} - different domain ({} != {})", url, host, self.seed_host);
                    return false;
                }
                None => return false,
            }
        }

        if self.restrict_to_path && !self.start_path.is_empty() {
            let path = parsed.path().trim_end_matches('/');
            if !path.starts_with(&self.start_path) {
                debug!(
                    "Skipping {} - outside path restriction (path: {}, required: {})",
                    url, path, self.start_path
                );
                return false;
            }
        }

        let path = parsed.path().to_lowercase();
        if SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            debug!("Skipping {} - file extension", url);
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(seed: &str, same_domain: bool, restrict: bool) -> CrawlPolicy {
        CrawlPolicy::from_seed(seed, same_domain, restrict).unwrap()
    }

    #[test]
    fn test_seed_path_is_stripped() {
        let p = policy("https://example.com/uit/", true, true);
        assert_eq!(p.seed_host, "example.com");
        assert_eq!(p.start_path, "/uit");
    }

    #[test]
    fn test_rejects_other_domains() {
        let p = policy("https://www.example.com/", true, false);
        assert!(p.allows("https://example.com/contact"));
        assert!(!p.allows("https://other.org/contact"));
    }

    #[test]
    fn test_cross_domain_allowed_when_unrestricted() {
        let p = policy("https://example.com/", false, false);
        assert!(p.allows("https://other.org/contact"));
    }

    #[test]
    fn test_path_restriction() {
        let p = policy("https://example.com/uit", true, true);
        assert!(p.allows("https://example.com/uit/services"));
        assert!(p.allows("https://example.com/uit"));
        assert!(!p.allows("https://example.com/about"));
    }

    #[test]
    fn test_root_seed_restricts_nothing() {
        let p = policy("https://example.com/", true, true);
        assert!(p.allows("https://example.com/about"));
    }

    #[test]
    fn test_rejects_non_html_extensions() {
        let p = policy("https://example.com/", true, false);
        assert!(!p.allows("https://example.com/report.PDF"));
        assert!(!p.allows("https://example.com/static/site.css"));
        assert!(p.allows("https://example.com/report.html"));
    }

    #[test]
    fn test_rejects_skip_prefixes_and_schemes() {
        let p = policy("https://example.com/", false, false);
        assert!(!p.allows("mailto:info@example.com"));
        assert!(!p.allows("tel:+15555550100"));
        assert!(!p.allows("javascript:void(0)"));
        assert!(!p.allows("#main"));
        assert!(!p.allows("ftp://example.com/file"));
    }

    #[test]
    fn test_garbage_fails_closed() {
        let p = policy("https://example.com/", false, false);
        assert!(!p.allows("::::"));
        assert!(CrawlPolicy::from_seed("not a url", true, true).is_none());
    }
}
