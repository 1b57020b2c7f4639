use crate::aggregate::{aggregate, capture_evidence};
use crate::checks::{CheckRegistry, EffectivePolicy};
use crate::error::{CoreError, Result};
use crate::model::{PageResult, ScanRequest, ScanResult, ScanStatus};
use crate::settings::Settings;
use crate::store::ScanStore;
use aoda_scanner::{
    AuditEngine, Browser, CrawlPolicy, CrawlTarget, Crawler, Frontier, ScanError, audit_page,
    run_heuristics,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Called after every page with the scan as it stands.
pub type ScanProgressCallback = Arc<dyn Fn(&ScanResult) + Send + Sync>;

/// Drives one scan at a time through fetch, audit and aggregation.
///
/// Pages are processed strictly one after another; concurrency across
/// scans belongs to the batch layer.
pub struct ScanRunner {
    browser: Arc<dyn Browser>,
    engine: Arc<dyn AuditEngine>,
    registry: Arc<CheckRegistry>,
    settings: Settings,
    store: Option<Arc<dyn ScanStore>>,
    cancel_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<ScanProgressCallback>,
}

impl ScanRunner {
    pub fn new(
        browser: Arc<dyn Browser>,
        engine: Arc<dyn AuditEngine>,
        registry: Arc<CheckRegistry>,
    ) -> Self {
        Self {
            browser,
            engine,
            registry,
            settings: Settings::default(),
            store: None,
            cancel_flag: None,
            progress_callback: None,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Checkpoint the in-progress scan to `store` after every page.
    pub fn with_store(mut self, store: Arc<dyn ScanStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stop between pages once `flag` is set; the scan ends `cancelled`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn with_progress_callback(mut self, callback: ScanProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run a fresh scan. Only an invalid request is an `Err`; page and
    /// engine failures are recorded on the returned result.
    pub async fn run(&self, request: ScanRequest) -> Result<ScanResult> {
        let seed = request.validate()?;
        let policy = crawl_policy(&seed, &request)?;
        let frontier = Frontier::new(seed.clone(), request.max_pages, request.max_depth);
        let scan = ScanResult::new(seed, request);
        Ok(self.execute(scan, frontier, policy).await)
    }

    /// Continue an interrupted scan from the store as a new run.
    ///
    /// Pages the prior run visited are never scanned again and count
    /// against the same page budget. The prior run's pending queue is
    /// restored when it was checkpointed; otherwise the frontier restarts
    /// from the seed.
    pub async fn resume(&self, scan_id: &str) -> Result<ScanResult> {
        let store = self.store.as_ref().ok_or_else(|| {
            CoreError::NotResumable(scan_id.to_string(), "no scan store configured".to_string())
        })?;
        let prior = store
            .get(scan_id)?
            .ok_or_else(|| CoreError::ScanNotFound(scan_id.to_string()))?;
        if prior.status == ScanStatus::Completed {
            return Err(CoreError::NotResumable(
                scan_id.to_string(),
                "scan already completed".to_string(),
            ));
        }

        let request = prior.config.clone();
        let seed = request.validate()?;
        let policy = crawl_policy(&seed, &request)?;

        let visited = prior.visited_urls();
        let pending = if prior.pending.is_empty() {
            vec![CrawlTarget::new(seed.clone(), 0)]
        } else {
            prior.pending.clone()
        };
        info!(
            "Resuming scan {} ({} pages already visited, {} pending)",
            scan_id,
            visited.len(),
            pending.len()
        );

        let frontier = Frontier::restore(
            pending,
            visited.iter().cloned(),
            request.max_pages,
            request.max_depth,
        );
        let mut scan = ScanResult::new(seed, request);
        scan.prior_visited = visited;
        scan.resumed_from = Some(prior.scan_id);

        Ok(self.execute(scan, frontier, policy).await)
    }

    async fn execute(
        &self,
        mut scan: ScanResult,
        mut frontier: Frontier,
        policy: CrawlPolicy,
    ) -> ScanResult {
        let request = scan.config.clone();
        let effective = self.registry.effective_policy(request.user_id.as_deref());
        let tags = request.scan_mode.tags();
        let crawler = Crawler::new(self.browser.clone(), policy)
            .with_timeout(self.settings.navigation_timeout());

        info!("Starting scan {} of {}", scan.scan_id, scan.start_url);
        info!(
            "Configuration: max_pages={}, max_depth={}, same_domain_only={}, restrict_to_path={}, mode={}",
            request.max_pages,
            request.max_depth,
            request.same_domain_only,
            request.restrict_to_path,
            request.scan_mode.as_str()
        );
        debug!(
            "Performance: request_delay={}ms, timeout={}ms, screenshots={}",
            self.settings.request_delay_ms,
            self.settings.navigation_timeout_ms,
            if request.enable_screenshots { "enabled" } else { "disabled" }
        );

        scan.start();
        self.checkpoint(&scan).await;

        loop {
            if self.is_cancelled() {
                info!("Scan {} cancelled after {} pages", scan.scan_id, scan.pages_scanned);
                scan.pending = frontier.pending();
                scan.cancel();
                break;
            }

            let Some(target) = frontier.next() else {
                scan.complete();
                info!(
                    "Scan {} completed. Scanned {} pages, {} violations",
                    scan.scan_id, scan.pages_scanned, scan.total_violations
                );
                break;
            };

            match self
                .scan_page(&crawler, &target, &effective, &tags, &request)
                .await
            {
                Ok((page, links)) => {
                    if target.depth < frontier.max_depth() && page.error.is_none() {
                        let found = links.len();
                        let added = links
                            .into_iter()
                            .filter(|link| frontier.enqueue(link.clone(), target.depth + 1))
                            .count();
                        debug!(
                            "Found {} links on {} at depth {}, {} new. Queue size: {}",
                            found,
                            target.url,
                            target.depth,
                            added,
                            frontier.queued_count()
                        );
                    }
                    scan.push_page(page);
                    if let Some(ref callback) = self.progress_callback {
                        callback(&scan);
                    }
                }
                Err(e) => {
                    error!("Scan {} failed on {}: {}", scan.scan_id, target.url, e);
                    let mut pending = vec![target];
                    pending.extend(frontier.pending());
                    scan.pending = pending;
                    scan.fail(e.to_string());
                    break;
                }
            }

            scan.pending = frontier.pending();
            self.checkpoint(&scan).await;

            if frontier.queued_count() > 0 && self.settings.request_delay_ms > 0 {
                tokio::time::sleep(self.settings.request_delay()).await;
            }
        }

        self.checkpoint(&scan).await;
        scan
    }

    /// Scan one page. `Err` is reserved for unrecoverable engine failures;
    /// anything scoped to this page is recorded on the `PageResult`.
    async fn scan_page(
        &self,
        crawler: &Crawler,
        target: &CrawlTarget,
        effective: &EffectivePolicy,
        tags: &[String],
        request: &ScanRequest,
    ) -> std::result::Result<(PageResult, Vec<String>), ScanError> {
        info!("Scanning: {}", target.url);
        let start = Instant::now();

        let (fetch, page) = match crawler.fetch(&target.url).await {
            Ok(loaded) => loaded,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Error loading {}: {}", target.url, e);
                let mut result = PageResult::with_error(&target.url, target.depth, e.to_string());
                result.load_time_ms = start.elapsed().as_millis() as u64;
                return Ok((result, Vec::new()));
            }
        };

        let mut result = PageResult::new(&target.url, target.depth);
        result.title = fetch.title.clone();
        result.status_code = fetch.status_code;

        let audited = audit_page(self.engine.as_ref(), page.as_ref(), tags).await;
        let outcome = match audited {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_fatal() => {
                close_page(page.as_ref(), &target.url).await;
                return Err(e);
            }
            Err(e) => {
                warn!("Audit failed for {}: {}", target.url, e);
                result.error = Some(e.to_string());
                None
            }
        };

        if let Some(outcome) = outcome {
            result.passes = outcome.passes;
            result.incomplete = outcome.incomplete;
            result.inapplicable = outcome.inapplicable;
            result.violations = aggregate(effective, outcome.violations, run_heuristics(&fetch.html));

            if request.enable_screenshots && request.max_screenshots_per_page > 0 {
                capture_evidence(
                    page.as_ref(),
                    &mut result.violations,
                    request.max_screenshots_per_page,
                )
                .await;
            }
        }

        close_page(page.as_ref(), &target.url).await;
        result.load_time_ms = start.elapsed().as_millis() as u64;

        debug!(
            "{}: {} violations, {} passes",
            target.url,
            result.violations.len(),
            result.passes
        );
        Ok((result, fetch.links_found))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Store writes are blocking file IO and run on the blocking pool.
    async fn checkpoint(&self, scan: &ScanResult) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let snapshot = scan.clone();
        match tokio::task::spawn_blocking(move || store.put(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to checkpoint scan {}: {}", scan.scan_id, e),
            Err(e) => warn!("Checkpoint task for scan {} failed: {}", scan.scan_id, e),
        }
    }
}

fn crawl_policy(seed: &str, request: &ScanRequest) -> Result<CrawlPolicy> {
    let policy = CrawlPolicy::from_seed(seed, request.same_domain_only, request.restrict_to_path)
        .ok_or_else(|| CoreError::InvalidRequest(format!("Cannot derive crawl policy from {}", seed)))?;
    info!("Domain: {}", policy.seed_host);
    if request.restrict_to_path {
        let shown = if policy.start_path.is_empty() { "/" } else { policy.start_path.as_str() };
        info!("Path restriction: {}", shown);
    }
    Ok(policy)
}

async fn close_page(page: &dyn aoda_scanner::BrowserPage, url: &str) {
    if let Err(e) = page.close().await {
        debug!("Failed to close page {}: {}", url, e);
    }
}
