// Scan request, per-page and whole-scan result records

use crate::aggregate::EffectiveViolation;
use crate::checks::Severity;
use crate::error::{CoreError, Result};
use aoda_scanner::crawler::validate_seed;
use aoda_scanner::{CrawlTarget, Impact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub const MAX_PAGES_LIMIT: usize = 500;
pub const MAX_DEPTH_LIMIT: usize = 10;

/// Which rule set the audit engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// WCAG 2.0 A/AA, as the AODA requires.
    #[default]
    Aoda,
    Wcag21,
}

impl ScanMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "aoda" | "wcag20" => Some(ScanMode::Aoda),
            "wcag21" => Some(ScanMode::Wcag21),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Aoda => "aoda",
            ScanMode::Wcag21 => "wcag21",
        }
    }

    /// Run-only tag filter for the audit engine.
    pub fn tags(&self) -> Vec<String> {
        let tags: &[&str] = match self {
            ScanMode::Aoda => &["wcag2a", "wcag2aa", "wcag20"],
            ScanMode::Wcag21 => &["wcag2a", "wcag2aa", "wcag21"],
        };
        tags.iter().map(|t| t.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub seed_url: String,
    pub max_pages: usize,
    pub max_depth: usize,
    pub same_domain_only: bool,
    pub restrict_to_path: bool,
    pub enable_screenshots: bool,
    pub max_screenshots_per_page: usize,
    #[serde(default)]
    pub scan_mode: ScanMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ScanRequest {
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            max_pages: 50,
            max_depth: 3,
            same_domain_only: true,
            restrict_to_path: true,
            enable_screenshots: false,
            max_screenshots_per_page: 5,
            scan_mode: ScanMode::Aoda,
            user_id: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_same_domain_only(mut self, same_domain_only: bool) -> Self {
        self.same_domain_only = same_domain_only;
        self
    }

    pub fn with_restrict_to_path(mut self, restrict_to_path: bool) -> Self {
        self.restrict_to_path = restrict_to_path;
        self
    }

    pub fn with_screenshots(mut self, enabled: bool, max_per_page: usize) -> Self {
        self.enable_screenshots = enabled;
        self.max_screenshots_per_page = max_per_page;
        self
    }

    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Check budgets and the seed; returns the normalized seed URL.
    pub fn validate(&self) -> Result<String> {
        if !(1..=MAX_PAGES_LIMIT).contains(&self.max_pages) {
            return Err(CoreError::InvalidRequest(format!(
                "max_pages must be between 1 and {} (got {})",
                MAX_PAGES_LIMIT, self.max_pages
            )));
        }
        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(CoreError::InvalidRequest(format!(
                "max_depth must be between 1 and {} (got {})",
                MAX_DEPTH_LIMIT, self.max_depth
            )));
        }
        validate_seed(&self.seed_url).map_err(|e| CoreError::InvalidRequest(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
            ScanStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
        )
    }

    /// pending -> running -> {completed, failed, cancelled}.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::Running)
                | (
                    ScanStatus::Running,
                    ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
                )
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub depth: usize,
    pub title: Option<String>,
    pub status_code: Option<u16>,
    pub violations: Vec<EffectiveViolation>,
    pub passes: usize,
    pub incomplete: usize,
    pub inapplicable: usize,
    pub error: Option<String>,
    pub load_time_ms: u64,
    pub scanned_at: DateTime<Utc>,
}

impl PageResult {
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
            title: None,
            status_code: None,
            violations: Vec::new(),
            passes: 0,
            incomplete: 0,
            inapplicable: 0,
            error: None,
            load_time_ms: 0,
            scanned_at: Utc::now(),
        }
    }

    pub fn with_error(url: impl Into<String>, depth: usize, error: impl Into<String>) -> Self {
        let mut page = Self::new(url, depth);
        page.error = Some(error.into());
        page
    }
}

/// Violation counts per final severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub alert: usize,
}

/// Violation counts per source impact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactCounts {
    pub critical: usize,
    pub serious: usize,
    pub moderate: usize,
    pub minor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    pub start_url: String,
    pub config: ScanRequest,
    pub page_results: Vec<PageResult>,
    pub pages_scanned: usize,
    pub pages_with_violations: usize,
    pub total_violations: usize,
    pub status: ScanStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// URLs visited by the scan this one resumed from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prior_visited: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<String>,
    /// Frontier queue at the last checkpoint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<CrawlTarget>,
}

impl ScanResult {
    pub fn new(start_url: impl Into<String>, config: ScanRequest) -> Self {
        Self {
            scan_id: Uuid::new_v4().to_string(),
            start_url: start_url.into(),
            config,
            page_results: Vec::new(),
            pages_scanned: 0,
            pages_with_violations: 0,
            total_violations: 0,
            status: ScanStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            error_message: None,
            prior_visited: Vec::new(),
            resumed_from: None,
            pending: Vec::new(),
        }
    }

    fn transition(&mut self, next: ScanStatus) -> bool {
        if !self.status.can_transition_to(next) {
            debug!(
                "Ignoring transition {} -> {} for scan {}",
                self.status.as_str(),
                next.as_str(),
                self.scan_id
            );
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.end_time = Some(Utc::now());
        }
        if next == ScanStatus::Completed {
            self.pending.clear();
        }
        true
    }

    pub fn start(&mut self) -> bool {
        if self.transition(ScanStatus::Running) {
            self.start_time = Utc::now();
            return true;
        }
        false
    }

    pub fn complete(&mut self) -> bool {
        self.transition(ScanStatus::Completed)
    }

    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        let failed = self.transition(ScanStatus::Failed);
        if failed {
            self.error_message = Some(message.into());
        }
        failed
    }

    pub fn cancel(&mut self) -> bool {
        self.transition(ScanStatus::Cancelled)
    }

    /// Append a finished page and update running totals.
    pub fn push_page(&mut self, page: PageResult) {
        self.pages_scanned += 1;
        if !page.violations.is_empty() {
            self.pages_with_violations += 1;
        }
        self.total_violations += page.violations.len();
        self.page_results.push(page);
    }

    /// Every URL this scan lineage has visited, including prior runs.
    pub fn visited_urls(&self) -> Vec<String> {
        self.prior_visited
            .iter()
            .cloned()
            .chain(self.page_results.iter().map(|p| p.url.clone()))
            .collect()
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }

    pub fn violations(&self) -> impl Iterator<Item = &EffectiveViolation> {
        self.page_results.iter().flat_map(|p| p.violations.iter())
    }

    pub fn violations_by_severity(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for v in self.violations() {
            match v.severity {
                Severity::Error => counts.error += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Alert => counts.alert += 1,
                Severity::Disabled => {}
            }
        }
        counts
    }

    pub fn violations_by_impact(&self) -> ImpactCounts {
        let mut counts = ImpactCounts::default();
        for v in self.violations() {
            match v.impact {
                Impact::Critical => counts.critical += 1,
                Impact::Serious => counts.serious += 1,
                Impact::Moderate => counts.moderate += 1,
                Impact::Minor => counts.minor += 1,
            }
        }
        counts
    }

    pub fn failed_pages(&self) -> usize {
        self.page_results.iter().filter(|p| p.error.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoda_scanner::{NodeRef, RuleSource};

    fn violation(severity: Severity, impact: Impact) -> EffectiveViolation {
        EffectiveViolation {
            rule_id: "image-alt".into(),
            severity,
            impact,
            description: String::new(),
            help: String::new(),
            help_url: String::new(),
            tags: Vec::new(),
            nodes: vec![NodeRef::new("img")],
            source: RuleSource::Audit,
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(ScanRequest::new("https://example.com").validate().is_ok());
        assert!(ScanRequest::new("https://example.com").with_max_pages(0).validate().is_err());
        assert!(ScanRequest::new("https://example.com").with_max_pages(501).validate().is_err());
        assert!(ScanRequest::new("https://example.com").with_max_depth(11).validate().is_err());
        assert!(ScanRequest::new("mailto:a@b.c").validate().is_err());
    }

    #[test]
    fn test_scan_mode_tags() {
        assert_eq!(ScanMode::Aoda.tags(), vec!["wcag2a", "wcag2aa", "wcag20"]);
        assert_eq!(ScanMode::Wcag21.tags(), vec!["wcag2a", "wcag2aa", "wcag21"]);
        assert_eq!(ScanMode::from_str("WCAG21"), Some(ScanMode::Wcag21));
        assert_eq!(ScanMode::from_str("508"), None);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut scan = ScanResult::new("https://example.com/", ScanRequest::new("https://example.com/"));
        assert_eq!(scan.status, ScanStatus::Pending);
        assert!(!scan.complete());
        assert!(scan.start());
        assert!(!scan.start());
        assert!(scan.fail("browser crashed"));
        assert_eq!(scan.status, ScanStatus::Failed);
        assert_eq!(scan.error_message.as_deref(), Some("browser crashed"));
        assert!(scan.end_time.is_some());
        assert!(!scan.complete());
    }

    #[test]
    fn test_totals_track_pages() {
        let mut scan = ScanResult::new("https://example.com/", ScanRequest::new("https://example.com/"));
        scan.start();

        let mut with = PageResult::new("https://example.com/", 0);
        with.violations = vec![
            violation(Severity::Error, Impact::Critical),
            violation(Severity::Warning, Impact::Moderate),
        ];
        scan.push_page(with);
        scan.push_page(PageResult::with_error("https://example.com/a", 1, "timeout"));

        assert_eq!(scan.pages_scanned, 2);
        assert_eq!(scan.pages_with_violations, 1);
        assert_eq!(scan.total_violations, 2);
        assert_eq!(scan.failed_pages(), 1);
        assert_eq!(
            scan.violations_by_severity(),
            SeverityCounts {
                error: 1,
                warning: 1,
                alert: 0
            }
        );
        assert_eq!(scan.violations_by_impact().critical, 1);
    }

    #[test]
    fn test_scan_ids_are_unique() {
        let request = ScanRequest::new("https://example.com/");
        let a = ScanResult::new("https://example.com/", request.clone());
        let b = ScanResult::new("https://example.com/", request);
        assert_ne!(a.scan_id, b.scan_id);
    }
}
