pub mod audit;
pub mod browser;
pub mod crawler;
pub mod error;
pub mod filter;
pub mod frontier;
pub mod heuristics;
pub mod normalize;
pub mod result;
pub mod violation;

pub use audit::{AuditEngine, AuditOutcome, AxeEngine, audit_page, normalize_response};
pub use browser::{Browser, BrowserPage, ChromiumBrowser};
pub use crawler::Crawler;
pub use error::ScanError;
pub use filter::CrawlPolicy;
pub use frontier::{CrawlTarget, Frontier};
pub use heuristics::run_heuristics;
pub use normalize::{normalize_link, normalize_url};
pub use result::FetchResult;
pub use violation::{Impact, NodeRef, RawViolation, RuleSource};
