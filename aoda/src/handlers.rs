use crate::commands::DEFAULT_CHECKS_FILE;
use anyhow::{Context, Result, anyhow, bail};
use aoda_core::batch::{BatchProgress, BatchRunner};
use aoda_core::checks::{CheckUpdate, Resolution};
use aoda_core::report::{ReportFormat, generate_batch_summary, generate_report, save_report};
use aoda_core::{
    CheckRegistry, FileStore, ScanMode, ScanRequest, ScanResult, ScanRunner, ScanStatus,
    ScanStore, Settings, Severity,
};
use aoda_scanner::{AxeEngine, Browser, ChromiumBrowser};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

// ============================================================================
// Input helpers
// ============================================================================

/// Load seed URLs from a newline-delimited file. Blank lines and `#`
/// comments are skipped.
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read hosts file {}", path.display()))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        bail!("No valid URLs found in {}", path.display());
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if line.contains("://") {
        return match Url::parse(line) {
            Ok(_) => Some(line.to_string()),
            Err(_) => {
                warn!("Skipping invalid URL '{}'", line);
                None
            }
        };
    }

    let with_scheme = format!("https://{}", line);
    match Url::parse(&with_scheme) {
        Ok(url) if url.host_str().is_some_and(|h| h.contains('.')) => Some(with_scheme),
        _ => {
            warn!("Skipping invalid URL '{}'", line);
            None
        }
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Built-in rules with the checks file applied on top, when it exists.
pub fn load_registry(path: &Path) -> Result<CheckRegistry> {
    let mut registry = CheckRegistry::with_defaults();
    if path.exists() {
        registry
            .load_file(path)
            .with_context(|| format!("Failed to load checks file {}", path.display()))?;
    } else {
        debug!("No checks file at {}, using defaults", path.display());
    }
    Ok(registry)
}

/// Build a scan request for `seed` from the shared scan options.
pub fn scan_request_from_args(seed: &str, args: &ArgMatches, settings: &Settings) -> Result<ScanRequest> {
    let mode = args
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("aoda");
    let scan_mode = ScanMode::from_str(mode).ok_or_else(|| anyhow!("Unknown scan mode '{}'", mode))?;

    let mut request = ScanRequest::new(seed)
        .with_max_pages(*args.get_one::<u64>("max-pages").unwrap_or(&50) as usize)
        .with_max_depth(*args.get_one::<u64>("max-depth").unwrap_or(&3) as usize)
        .with_same_domain_only(!args.get_flag("allow-cross-domain"))
        .with_restrict_to_path(!args.get_flag("no-path-restriction"))
        .with_scan_mode(scan_mode)
        .with_screenshots(
            args.get_flag("screenshots"),
            args.get_one::<usize>("max-screenshots")
                .copied()
                .unwrap_or(settings.max_screenshots_per_page),
        );
    if let Some(user) = args.get_one::<String>("user") {
        request = request.with_user(user.clone());
    }

    Ok(request)
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

pub fn checks_path(args: &ArgMatches) -> PathBuf {
    expand_path(
        args.get_one::<String>("checks")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CHECKS_FILE),
    )
}

fn store_path(args: &ArgMatches) -> Option<PathBuf> {
    args.get_one::<String>("store").map(|s| expand_path(s))
}

// ============================================================================
// scan / batch
// ============================================================================

struct Engines {
    browser: Arc<ChromiumBrowser>,
    engine: Arc<AxeEngine>,
}

impl Engines {
    async fn start(settings: &Settings) -> Result<Self> {
        let engine = AxeEngine::from_file(&settings.axe_script).with_context(|| {
            format!(
                "Failed to load audit script {} (set AODA_AXE_SCRIPT)",
                settings.axe_script.display()
            )
        })?;
        let browser = ChromiumBrowser::launch()
            .await
            .context("Failed to launch headless Chromium")?;
        Ok(Self {
            browser: Arc::new(browser),
            engine: Arc::new(engine),
        })
    }

    fn runner(&self, registry: CheckRegistry, settings: &Settings) -> ScanRunner {
        let browser: Arc<dyn Browser> = self.browser.clone();
        ScanRunner::new(browser, self.engine.clone(), Arc::new(registry))
            .with_settings(settings.clone())
    }

    /// Call once every runner has been dropped.
    async fn shutdown(self) {
        match Arc::try_unwrap(self.browser) {
            Ok(browser) => browser.shutdown().await,
            Err(_) => debug!("Browser still shared at shutdown, leaving it to drop"),
        }
    }
}

fn progress_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Set `flag` on Ctrl-C so running scans stop between pages.
fn cancel_on_interrupt(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current page");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

fn emit(content: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            save_report(content, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("{} Report saved to {}", "✓".green().bold(), path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn print_scan_summary(scan: &ScanResult) {
    let status = match scan.status {
        ScanStatus::Completed => "completed".green().bold(),
        ScanStatus::Failed => "failed".red().bold(),
        ScanStatus::Cancelled => "cancelled".yellow().bold(),
        other => other.as_str().normal(),
    };
    let severity = scan.violations_by_severity();
    eprintln!(
        "\n{} Scan {} {}: {} pages, {} violations ({} error, {} warning, {} alert)",
        "→".blue(),
        scan.scan_id.bright_white(),
        status,
        scan.pages_scanned,
        scan.total_violations,
        severity.error.to_string().red(),
        severity.warning.to_string().yellow(),
        severity.alert.to_string().cyan()
    );
    if let Some(ref message) = scan.error_message {
        eprintln!("{} {}", "✗".red().bold(), message);
    }
    if scan.status != ScanStatus::Completed {
        eprintln!(
            "{} Resume with: aoda scan --resume {}",
            "ℹ".blue(),
            scan.scan_id
        );
    }
}

/// Returns `false` when the scan ended in any state but `completed`.
pub async fn handle_scan(args: &ArgMatches, settings: &Settings, quiet: bool) -> Result<bool> {
    let registry = load_registry(&checks_path(args))?;
    let store_dir = store_path(args);
    let store: Option<Arc<dyn ScanStore>> = match store_dir {
        Some(ref dir) => Some(Arc::new(FileStore::new(dir).with_context(|| {
            format!("Failed to open scan store {}", dir.display())
        })?)),
        None => None,
    };

    let request = match args.get_one::<String>("url") {
        Some(url) => {
            let request = scan_request_from_args(url, args, settings)?;
            request.validate()?;
            Some(request)
        }
        None => None,
    };

    let engines = Engines::start(settings).await?;
    let spinner = progress_spinner(quiet);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    cancel_on_interrupt(cancel_flag.clone());

    let progress = spinner.clone();
    let mut runner = engines
        .runner(registry, settings)
        .with_cancel_flag(cancel_flag)
        .with_progress_callback(Arc::new(move |scan: &ScanResult| {
            let last = scan.page_results.last().map(|p| p.url.as_str()).unwrap_or("");
            progress.set_message(format!(
                "{} pages, {} violations | {}",
                scan.pages_scanned, scan.total_violations, last
            ));
        }));
    if let Some(store) = store {
        runner = runner.with_store(store);
    }

    let outcome = match (request, args.get_one::<String>("resume")) {
        (Some(request), _) => {
            spinner.set_message(format!("Scanning {}", request.seed_url));
            runner.run(request).await
        }
        (None, Some(scan_id)) => {
            spinner.set_message(format!("Resuming {}", scan_id));
            runner.resume(scan_id).await
        }
        (None, None) => Err(aoda_core::CoreError::InvalidRequest(
            "Either --url or --resume must be provided".to_string(),
        )),
    };
    spinner.finish_and_clear();
    drop(runner);
    engines.shutdown().await;

    let scan = outcome?;
    info!("Scan {} finished as {}", scan.scan_id, scan.status.as_str());

    let report = generate_report(&scan, report_format(args))?;
    emit(&report, args.get_one::<PathBuf>("output"))?;
    print_scan_summary(&scan);

    Ok(scan.status == ScanStatus::Completed)
}

/// Returns `false` when any scan in the batch did not complete.
pub async fn handle_batch(args: &ArgMatches, settings: &Settings, quiet: bool) -> Result<bool> {
    let hosts_file = args
        .get_one::<PathBuf>("hosts-file")
        .ok_or_else(|| anyhow!("--hosts-file is required"))?;
    let urls = load_urls_from_file(hosts_file)?;
    let registry = load_registry(&checks_path(args))?;
    let template = scan_request_from_args("", args, settings)?;
    let concurrency = args
        .get_one::<usize>("threads")
        .copied()
        .unwrap_or(settings.batch_concurrency);

    if !quiet {
        eprintln!(
            "{} Scanning {} sites, {} at a time",
            "→".blue(),
            urls.len().to_string().bright_white(),
            concurrency
        );
    }

    let engines = Engines::start(settings).await?;
    let mut runner = engines.runner(registry, settings);
    if let Some(dir) = store_path(args) {
        runner = runner.with_store(Arc::new(FileStore::new(&dir).with_context(|| {
            format!("Failed to open scan store {}", dir.display())
        })?));
    }

    let spinner = progress_spinner(quiet);
    let progress = spinner.clone();
    let batch = BatchRunner::new(runner)
        .with_concurrency(concurrency)
        .with_progress_callback(Arc::new(move |p: &BatchProgress| {
            progress.set_message(format!(
                "{}/{} done, {} running | {}",
                p.finished(),
                p.total,
                p.in_progress,
                p.current_url.as_deref().unwrap_or("")
            ));
        }));
    cancel_on_interrupt(batch.cancel_handle());

    let outcome = batch.run(urls, template).await;
    spinner.finish_and_clear();
    drop(batch);
    engines.shutdown().await;

    let report = outcome?;
    let content = match report_format(args) {
        ReportFormat::Text => generate_batch_summary(&report),
        ReportFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "batch": report.progress,
            "scans": report.scans,
        }))?,
    };
    emit(&content, args.get_one::<PathBuf>("output"))?;

    let p = &report.progress;
    Ok(p.failed == 0 && p.cancelled == 0)
}

// ============================================================================
// checks
// ============================================================================

pub fn handle_checks_list(args: &ArgMatches, path: &Path) -> Result<()> {
    let registry = load_registry(path)?;
    let user = args.get_one::<String>("user").map(String::as_str);

    println!(
        "{:<28} {:<9} {:<8} {:<8} {:<5} {:<5} {}",
        "CHECK", "SEVERITY", "ENABLED", "WCAG", "LEVEL", "AODA", "SOURCE"
    );
    for check in registry.list() {
        let (resolved, source) = match registry.resolve(&check.check_id, user) {
            Resolution::Override(r) => (r, "override"),
            Resolution::Default(r) => (r, "default"),
            Resolution::Unrecognized => continue,
        };
        let line = format!(
            "{:<28} {:<9} {:<8} {:<8} {:<5} {:<5} {}",
            check.check_id,
            resolved.severity.as_str(),
            if resolved.enabled { "yes" } else { "no" },
            check.wcag_criterion.as_deref().unwrap_or("-"),
            check
                .wcag_level
                .map(|l| format!("{:?}", l))
                .unwrap_or_else(|| "-".to_string()),
            if check.aoda_required { "yes" } else { "no" },
            source
        );
        if resolved.is_active() {
            println!("{}", line);
        } else {
            println!("{}", line.dimmed());
        }
    }
    Ok(())
}

pub fn handle_checks_set(args: &ArgMatches, path: &Path) -> Result<()> {
    let mut registry = load_registry(path)?;
    let check_id = args
        .get_one::<String>("CHECK_ID")
        .ok_or_else(|| anyhow!("CHECK_ID is required"))?;
    let severity = args
        .get_one::<String>("severity")
        .map(|s| Severity::from_str(s).ok_or_else(|| anyhow!("Unknown severity '{}'", s)))
        .transpose()?;
    let enabled = if args.get_flag("enable") {
        Some(true)
    } else if args.get_flag("disable") {
        Some(false)
    } else {
        None
    };
    if severity.is_none() && enabled.is_none() {
        bail!("Nothing to change: pass --severity, --enable or --disable");
    }

    match args.get_one::<String>("user") {
        Some(user) => {
            let current = registry.resolve(check_id, Some(user));
            let base = current
                .resolved()
                .ok_or_else(|| anyhow!("Unknown check '{}'", check_id))?;
            let saved = registry.set_override(
                user,
                check_id,
                enabled.unwrap_or(base.enabled),
                severity.unwrap_or(base.severity),
            )?;
            println!(
                "{} Override for {} on {}: enabled={}, severity={}",
                "✓".green().bold(),
                user.bright_white(),
                check_id.bright_white(),
                saved.enabled,
                saved.severity.as_str()
            );
        }
        None => {
            let saved = registry.update(&CheckUpdate {
                check_id: check_id.clone(),
                enabled,
                severity,
            })?;
            println!(
                "{} {}: enabled={}, severity={}",
                "✓".green().bold(),
                check_id.bright_white(),
                saved.enabled,
                saved.severity.as_str()
            );
        }
    }

    registry.save_file(path)?;
    Ok(())
}

pub fn handle_checks_reset(args: &ArgMatches, path: &Path) -> Result<()> {
    let mut registry = load_registry(path)?;
    let user = args
        .get_one::<String>("user")
        .ok_or_else(|| anyhow!("--user is required"))?;

    let removed = match args.get_one::<String>("CHECK_ID") {
        Some(check_id) => usize::from(registry.remove_override(user, check_id)),
        None => registry.reset_user(user),
    };
    registry.save_file(path)?;
    println!(
        "{} Removed {} override{} for {}",
        "✓".green().bold(),
        removed,
        if removed == 1 { "" } else { "s" },
        user.bright_white()
    );
    Ok(())
}

// ============================================================================
// scans
// ============================================================================

fn open_store(args: &ArgMatches) -> Result<FileStore> {
    let dir = store_path(args).ok_or_else(|| anyhow!("--store is required"))?;
    FileStore::new(&dir).with_context(|| format!("Failed to open scan store {}", dir.display()))
}

pub fn handle_scans_list(args: &ArgMatches) -> Result<()> {
    let store = open_store(args)?;
    let scans = store.list()?;
    if scans.is_empty() {
        println!("No scans in {}", store.dir().display());
        return Ok(());
    }

    println!(
        "{:<36}  {:<10} {:<20} {:>5} {:>10}  {}",
        "SCAN ID", "STATUS", "STARTED", "PAGES", "VIOLATIONS", "URL"
    );
    for scan in scans {
        println!(
            "{:<36}  {:<10} {:<20} {:>5} {:>10}  {}",
            scan.scan_id,
            scan.status.as_str(),
            scan.start_time.format("%Y-%m-%d %H:%M:%S"),
            scan.pages_scanned,
            scan.total_violations,
            scan.start_url
        );
    }
    Ok(())
}

pub fn handle_scans_show(args: &ArgMatches, parent: &ArgMatches) -> Result<()> {
    let store = open_store(parent)?;
    let scan_id = args
        .get_one::<String>("SCAN_ID")
        .ok_or_else(|| anyhow!("SCAN_ID is required"))?;
    let scan = store
        .get(scan_id)?
        .ok_or_else(|| anyhow!("No scan {} in {}", scan_id, store.dir().display()))?;
    print!("{}", generate_report(&scan, report_format(args))?);
    Ok(())
}
