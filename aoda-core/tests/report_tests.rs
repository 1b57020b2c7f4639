// Tests for text, JSON and batch report rendering

mod common;

use aoda_core::batch::BatchRunner;
use aoda_core::model::{ScanRequest, ScanResult};
use aoda_core::report::{
    ReportFormat, generate_batch_summary, generate_json_report, generate_report,
    generate_text_report, save_report,
};
use common::*;
use serde_json::{Value, json};

async fn scanned() -> ScanResult {
    let browser = FakeBrowser::new()
        .page("https://example.com/", &links(&["/contact", "/gone"]))
        .page("https://example.com/contact", &links(&[]));
    let engine = FakeEngine::new().response(
        "https://example.com/contact",
        json!({
            "violations": [
                violation("image-alt", "critical", &["img.hero", "img.logo"]),
                violation("region", "moderate", &["div.main"])
            ],
            "passes": [{ "id": "document-title" }, { "id": "html-has-lang" }]
        }),
    );

    runner(browser, engine)
        .run(ScanRequest::new("https://example.com/"))
        .await
        .unwrap()
}

// ============================================================================
// Text report
// ============================================================================

#[tokio::test]
async fn test_text_report_contains_summary_and_violations() {
    let scan = scanned().await;
    let report = generate_text_report(&scan);

    assert!(report.contains("AODA ACCESSIBILITY SCAN REPORT"));
    assert!(report.contains(&scan.scan_id));
    assert!(report.contains("Status:       Completed"));
    assert!(report.contains("Pages Scanned:          3"));
    assert!(report.contains("Total Violations:       2"));
    assert!(report.contains("[ERROR] image-alt (2 elements)"));
    assert!(report.contains("      - img.hero"));
    assert!(report.contains("https://example.com/gone"));
    assert!(report.contains("End of Report"));
}

#[tokio::test]
async fn test_text_report_orders_errors_before_warnings() {
    let scan = scanned().await;
    let report = generate_text_report(&scan);

    let error = report.find("image-alt (").unwrap();
    let warning = report.find("region (").unwrap();
    assert!(error < warning);
}

#[tokio::test]
async fn test_clean_pages_are_omitted_from_text_report() {
    let scan = scanned().await;
    let report = generate_text_report(&scan);

    let pages = report.split("PAGES").nth(1).unwrap();
    assert!(!pages.contains("https://example.com/\n"));
}

// ============================================================================
// JSON report
// ============================================================================

#[tokio::test]
async fn test_json_report_structure() {
    let scan = scanned().await;
    let parsed: Value = serde_json::from_str(&generate_json_report(&scan).unwrap()).unwrap();
    let report = &parsed["report"];

    assert_eq!(report["metadata"]["generator"], "aoda");
    assert_eq!(report["scan"]["id"], scan.scan_id.as_str());
    assert_eq!(report["scan"]["status"], "completed");
    assert_eq!(report["summary"]["pages_scanned"], 3);
    assert_eq!(report["summary"]["total_violations"], 2);
    assert_eq!(report["pages"].as_array().unwrap().len(), 3);
    assert_eq!(report["pages"][1]["passes"], 2);
}

#[test]
fn test_report_format_parsing() {
    assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("txt"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("html"), None);
}

#[tokio::test]
async fn test_generate_report_dispatches_on_format() {
    let scan = scanned().await;
    let text = generate_report(&scan, ReportFormat::Text).unwrap();
    let json = generate_report(&scan, ReportFormat::Json).unwrap();

    assert!(text.starts_with("━"));
    assert!(json.trim_start().starts_with('{'));
}

#[tokio::test]
async fn test_save_report_writes_file() {
    let scan = scanned().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");

    save_report(&generate_text_report(&scan), &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("SUMMARY"));
}

// ============================================================================
// Batch summary
// ============================================================================

#[tokio::test]
async fn test_batch_summary_lists_each_scan() {
    let browser = FakeBrowser::new()
        .page("https://one.example.com/", &links(&[]))
        .respond("https://down.example.com/", FakeResponse::Crash);
    let batch = BatchRunner::new(runner(browser, FakeEngine::new()));

    let report = batch
        .run(
            vec![
                "https://one.example.com/".to_string(),
                "https://down.example.com/".to_string(),
            ],
            ScanRequest::new(""),
        )
        .await
        .unwrap();
    let summary = generate_batch_summary(&report);

    assert!(summary.contains("BATCH SUMMARY"));
    assert!(summary.contains("2 total, 1 completed, 1 failed, 0 cancelled"));
    assert!(summary.contains("https://one.example.com/"));
    assert!(summary.contains("Failed:\n  https://down.example.com/"));
}
