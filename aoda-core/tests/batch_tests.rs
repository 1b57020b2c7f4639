// Tests for batch scans over a bounded worker pool

mod common;

use aoda_core::batch::{BatchProgress, BatchRunner, BatchStatus, MAX_BATCH_URLS};
use aoda_core::model::{ScanRequest, ScanStatus};
use aoda_core::{CoreError, ScanRunner};
use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn site() -> FakeBrowser {
    FakeBrowser::new()
        .page("https://one.example.com/", &links(&["/a"]))
        .page("https://one.example.com/a", &links(&[]))
        .page("https://two.example.com/", &links(&[]))
        .page("https://three.example.com/", &links(&[]))
        .respond("https://down.example.com/", FakeResponse::Crash)
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

// ============================================================================
// Outcomes
// ============================================================================

#[tokio::test]
async fn test_batch_scans_every_url_in_input_order() {
    let batch = BatchRunner::new(runner(site(), FakeEngine::new())).with_concurrency(2);

    let report = batch
        .run(
            urls(&[
                "https://one.example.com/",
                "https://two.example.com/",
                "https://three.example.com/",
            ]),
            ScanRequest::new(""),
        )
        .await
        .unwrap();

    let starts: Vec<&str> = report.scans.iter().map(|s| s.start_url.as_str()).collect();
    assert_eq!(
        starts,
        vec![
            "https://one.example.com/",
            "https://two.example.com/",
            "https://three.example.com/"
        ]
    );
    assert_eq!(report.progress.total, 3);
    assert_eq!(report.progress.completed, 3);
    assert_eq!(report.progress.finished(), 3);
    assert_eq!(report.progress.status, BatchStatus::Completed);
    assert_eq!(report.progress.scan_ids.len(), 3);
    assert!(report.progress.end_time.is_some());
    assert_eq!(report.scans[0].pages_scanned, 2);
}

#[tokio::test]
async fn test_batch_records_failed_scans() {
    let batch = BatchRunner::new(runner(site(), FakeEngine::new()));

    let report = batch
        .run(
            urls(&["https://two.example.com/", "https://down.example.com/", "not a url"]),
            ScanRequest::new(""),
        )
        .await
        .unwrap();

    assert_eq!(report.progress.completed, 1);
    assert_eq!(report.progress.failed, 2);
    assert_eq!(
        report.progress.failed_urls.len(),
        2,
        "both the crashed scan and the rejected request are failures"
    );
    assert!(report.progress.failed_urls.contains(&"not a url".to_string()));
    assert_eq!(report.scans.len(), 2);
    assert_eq!(report.scans[1].status, ScanStatus::Failed);
}

#[tokio::test]
async fn test_batch_template_applies_to_each_scan() {
    let batch = BatchRunner::new(runner(site(), FakeEngine::new()));

    let report = batch
        .run(
            urls(&["https://one.example.com/"]),
            ScanRequest::new("").with_max_pages(1),
        )
        .await
        .unwrap();

    assert_eq!(report.scans[0].pages_scanned, 1);
    assert_eq!(report.scans[0].config.max_pages, 1);
}

// ============================================================================
// Limits
// ============================================================================

#[tokio::test]
async fn test_batch_rejects_empty_and_oversized_lists() {
    let batch = BatchRunner::new(runner(site(), FakeEngine::new()));

    let empty = batch.run(Vec::new(), ScanRequest::new("")).await.unwrap_err();
    assert!(matches!(empty, CoreError::InvalidRequest(_)));

    let many: Vec<String> = (0..=MAX_BATCH_URLS)
        .map(|i| format!("https://site{}.example.com/", i))
        .collect();
    let oversized = batch.run(many, ScanRequest::new("")).await.unwrap_err();
    assert!(matches!(oversized, CoreError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_batch_never_exceeds_concurrency() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let (a, p) = (active.clone(), peak.clone());
    let scan_runner = runner(site(), FakeEngine::new());
    let batch = BatchRunner::new(scan_runner)
        .with_concurrency(2)
        .with_progress_callback(Arc::new(move |progress: &BatchProgress| {
            a.store(progress.in_progress, Ordering::SeqCst);
            p.fetch_max(progress.in_progress, Ordering::SeqCst);
        }));

    batch
        .run(
            urls(&[
                "https://one.example.com/",
                "https://two.example.com/",
                "https://three.example.com/",
                "https://two.example.com/",
            ]),
            ScanRequest::new(""),
        )
        .await
        .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_batch_skips_unstarted_scans() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let scan_runner: ScanRunner = runner(site(), FakeEngine::new());
    let batch = BatchRunner::new(scan_runner).with_concurrency(1);
    let cancel = batch.cancel_handle();

    let log = seen.clone();
    let batch = batch.with_progress_callback(Arc::new(move |progress: &BatchProgress| {
        log.lock().unwrap().push(progress.finished());
        if progress.finished() >= 1 {
            cancel.store(true, Ordering::SeqCst);
        }
    }));

    let report = batch
        .run(
            urls(&[
                "https://two.example.com/",
                "https://three.example.com/",
                "https://one.example.com/",
            ]),
            ScanRequest::new(""),
        )
        .await
        .unwrap();

    assert_eq!(report.progress.status, BatchStatus::Cancelled);
    assert_eq!(report.progress.completed, 1);
    assert_eq!(report.progress.cancelled, 2);
    assert_eq!(report.progress.finished(), 3);
    assert!(!seen.lock().unwrap().is_empty());
}
