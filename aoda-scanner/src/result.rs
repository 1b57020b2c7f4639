use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What was learned from loading one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub title: Option<String>,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    /// Rendered markup after scripts ran.
    #[serde(skip)]
    pub html: String,
    /// Normalized links that passed the crawl policy, in document order.
    pub links_found: Vec<String>,
}

impl FetchResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            title: None,
            status_code: None,
            response_time: Duration::from_secs(0),
            html: String::new(),
            links_found: Vec::new(),
        }
    }
}
