// Report rendering for scan results

use crate::batch::BatchReport;
use crate::checks::Severity;
use crate::model::{ScanResult, ScanStatus};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const THIN_RULE: &str = "────────────────────────────────────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

pub fn generate_report(scan: &ScanResult, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(scan)),
        ReportFormat::Json => generate_json_report(scan),
    }
}

pub fn generate_text_report(scan: &ScanResult) -> String {
    let mut report = String::new();

    section(&mut report, "                      AODA ACCESSIBILITY SCAN REPORT");

    report.push_str(&format!("Scan ID:      {}\n", scan.scan_id));
    report.push_str(&format!("Status:       {}\n", status_label(scan.status)));
    report.push_str(&format!("Start URL:    {}\n", scan.start_url));
    report.push_str(&format!("Mode:         {}\n", scan.config.scan_mode.as_str()));
    report.push_str(&format!(
        "Scan Date:    {}\n",
        scan.start_time.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(duration) = scan.duration_seconds() {
        report.push_str(&format!("Duration:     {:.1} seconds\n", duration));
    }
    if let Some(ref resumed) = scan.resumed_from {
        report.push_str(&format!("Resumed From: {}\n", resumed));
    }
    if let Some(ref message) = scan.error_message {
        report.push_str(&format!("Error:        {}\n", message));
    }
    report.push('\n');

    section(&mut report, "SUMMARY");

    let severity = scan.violations_by_severity();
    let impact = scan.violations_by_impact();
    report.push_str(&format!("Pages Scanned:          {}\n", scan.pages_scanned));
    report.push_str(&format!("Pages With Violations:  {}\n", scan.pages_with_violations));
    report.push_str(&format!("Pages With Errors:      {}\n", scan.failed_pages()));
    report.push_str(&format!("Total Violations:       {}\n\n", scan.total_violations));

    if severity.error > 0 {
        report.push_str(&format!("  [ERROR]    {}\n", severity.error));
    }
    if severity.warning > 0 {
        report.push_str(&format!("  [WARNING]  {}\n", severity.warning));
    }
    if severity.alert > 0 {
        report.push_str(&format!("  [ALERT]    {}\n", severity.alert));
    }
    report.push_str(&format!(
        "\nBy impact: critical {}, serious {}, moderate {}, minor {}\n\n",
        impact.critical, impact.serious, impact.moderate, impact.minor
    ));

    let pages_with_output: Vec<_> = scan
        .page_results
        .iter()
        .filter(|p| !p.violations.is_empty() || p.error.is_some())
        .collect();

    if !pages_with_output.is_empty() {
        section(&mut report, "PAGES");

        for page in pages_with_output {
            report.push_str(&format!("{}\n", page.url));
            if let Some(ref title) = page.title {
                report.push_str(&format!("Title:        {}\n", title));
            }
            if let Some(status) = page.status_code {
                report.push_str(&format!("HTTP Status:  {}\n", status));
            }
            if let Some(ref error) = page.error {
                report.push_str(&format!("Error:        {}\n", error));
            }
            report.push('\n');

            for severity in Severity::REPORTED {
                for v in page.violations.iter().filter(|v| v.severity == severity) {
                    report.push_str(&format!(
                        "  [{}] {} ({} element{})\n",
                        severity.as_str().to_uppercase(),
                        v.rule_id,
                        v.nodes.len(),
                        if v.nodes.len() == 1 { "" } else { "s" }
                    ));
                    report.push_str(&wrap_text(&v.help, 80, "      "));
                    for node in v.nodes.iter().take(3) {
                        report.push_str(&format!("      - {}\n", node.selector));
                    }
                    if v.nodes.len() > 3 {
                        report.push_str(&format!("      ... and {} more\n", v.nodes.len() - 3));
                    }
                    if !v.help_url.is_empty() {
                        report.push_str(&format!("      {}\n", v.help_url));
                    }
                }
            }
            report.push_str(THIN_RULE);
            report.push_str("\n\n");
        }
    }

    report.push_str(RULE);
    report.push_str("\n                          End of Report\n");
    report.push_str(RULE);
    report.push('\n');

    report
}

pub fn generate_json_report(scan: &ScanResult) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "aoda",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "scan": {
                "id": scan.scan_id,
                "start_url": scan.start_url,
                "status": scan.status,
                "start_time": scan.start_time.to_rfc3339(),
                "end_time": scan.end_time.map(|t| t.to_rfc3339()),
                "duration_seconds": scan.duration_seconds(),
                "error_message": scan.error_message,
                "resumed_from": scan.resumed_from,
                "config": scan.config
            },
            "summary": {
                "pages_scanned": scan.pages_scanned,
                "pages_with_violations": scan.pages_with_violations,
                "total_violations": scan.total_violations,
                "by_severity": scan.violations_by_severity(),
                "by_impact": scan.violations_by_impact()
            },
            "pages": scan.page_results
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// One line per scan plus batch totals.
pub fn generate_batch_summary(batch: &BatchReport) -> String {
    let mut report = String::new();
    let p = &batch.progress;

    section(&mut report, "BATCH SUMMARY");
    report.push_str(&format!("Batch ID:   {}\n", p.batch_id));
    report.push_str(&format!(
        "Scans:      {} total, {} completed, {} failed, {} cancelled\n\n",
        p.total, p.completed, p.failed, p.cancelled
    ));

    report.push_str(&format!(
        "{:<50} {:>10} {:>6} {:>10}\n",
        "URL", "STATUS", "PAGES", "VIOLATIONS"
    ));
    for scan in &batch.scans {
        report.push_str(&format!(
            "{:<50} {:>10} {:>6} {:>10}\n",
            truncate(&scan.start_url, 50),
            scan.status.as_str(),
            scan.pages_scanned,
            scan.total_violations
        ));
    }

    if !p.failed_urls.is_empty() {
        report.push_str("\nFailed:\n");
        for url in &p.failed_urls {
            report.push_str(&format!("  {}\n", url));
        }
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push('\n');
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");
}

fn status_label(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Pending => "Pending",
        ScanStatus::Running => "Running",
        ScanStatus::Completed => "Completed",
        ScanStatus::Failed => "Failed",
        ScanStatus::Cancelled => "Cancelled",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.len() && !current_line.is_empty() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
