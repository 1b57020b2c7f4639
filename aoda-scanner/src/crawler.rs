use crate::browser::{Browser, BrowserPage};
use crate::error::{Result, ScanError};
use crate::filter::CrawlPolicy;
use crate::normalize::normalize_link;
use crate::result::FetchResult;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Loads pages through a [`Browser`] and discovers crawlable links.
pub struct Crawler {
    browser: Arc<dyn Browser>,
    policy: CrawlPolicy,
    timeout: Duration,
}

impl Crawler {
    pub fn new(browser: Arc<dyn Browser>, policy: CrawlPolicy) -> Self {
        Self {
            browser,
            policy,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> &CrawlPolicy {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Navigate to `url` and collect title, status, markup and links.
    ///
    /// On success the open page is handed back so the caller can audit it;
    /// the caller must close it.
    pub async fn fetch(&self, url: &str) -> Result<(FetchResult, Box<dyn BrowserPage>)> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let page = self.browser.open(url, self.timeout).await?;
        let response_time = start.elapsed();

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                if let Err(close_err) = page.close().await {
                    debug!("Failed to close page {}: {}", url, close_err);
                }
                return Err(e);
            }
        };

        let mut result = FetchResult::new(url.to_string());
        result.response_time = response_time;
        result.title = page.title().await.unwrap_or_else(|e| {
            debug!("No title for {}: {}", url, e);
            None
        });
        result.status_code = page.status().await.unwrap_or_else(|e| {
            debug!("No status for {}: {}", url, e);
            None
        });

        if let Some(status) = result.status_code
            && status >= 400
        {
            warn!("{} answered with HTTP {}", url, status);
        }

        let final_url = match page.url().await {
            Ok(Some(final_url)) if final_url != url => {
                debug!("{} redirected to {}", url, final_url);
                final_url
            }
            Ok(_) => url.to_string(),
            Err(e) => {
                debug!("No final URL for {}: {}", url, e);
                url.to_string()
            }
        };
        result.links_found = self.extract_links(&html, &final_url);
        result.html = html;

        Ok((result, page))
    }

    /// Normalize every `a[href]` in `html` against the document's base URL
    /// and keep the ones the crawl policy accepts, deduplicated in document
    /// order. The base is `<base href>` when present, else `current_url`.
    pub fn extract_links(&self, html: &str, current_url: &str) -> Vec<String> {
        extract_links(html, current_url, &self.policy)
    }
}

pub fn extract_links(html: &str, current_url: &str, policy: &CrawlPolicy) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let base_url = document_base(&document, current_url);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }

        if let Some(absolute_url) = normalize_link(&base_url, href)
            && policy.allows(&absolute_url)
            && seen.insert(absolute_url.clone())
        {
            debug!("Found link: {}", absolute_url);
            links.push(absolute_url);
        }
    }

    links
}

/// First `<base href>` resolved against `current_url`, or `current_url`.
fn document_base(document: &Html, current_url: &str) -> String {
    let Ok(base_selector) = Selector::parse("base[href]") else {
        return current_url.to_string();
    };
    document
        .select(&base_selector)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| Url::parse(current_url).ok()?.join(href.trim()).ok())
        .map(String::from)
        .unwrap_or_else(|| current_url.to_string())
}

/// Check that a seed is something we can crawl before any browser work.
pub fn validate_seed(seed: &str) -> Result<String> {
    let normalized = crate::normalize::normalize_url(seed)
        .ok_or_else(|| ScanError::InvalidUrl(seed.to_string()))?;
    if !normalized.starts_with("https://") {
        return Err(ScanError::InvalidUrl(format!(
            "{} (only http and https are supported)",
            seed
        )));
    }
    Ok(normalized)
}
