// Violation aggregation and screenshot evidence

use crate::checks::{EffectivePolicy, Severity};
use aoda_scanner::{BrowserPage, Impact, NodeRef, RawViolation, RuleSource};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A violation after policy resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveViolation {
    pub rule_id: String,
    pub severity: Severity,
    /// Impact as reported by the source, kept for impact summaries.
    pub impact: Impact,
    pub description: String,
    pub help: String,
    pub help_url: String,
    pub tags: Vec<String>,
    pub nodes: Vec<NodeRef>,
    pub source: RuleSource,
}

impl EffectiveViolation {
    fn from_raw(raw: RawViolation, severity: Severity) -> Self {
        Self {
            rule_id: raw.rule_id,
            severity,
            impact: raw.impact,
            description: raw.description,
            help: raw.help,
            help_url: raw.help_url,
            tags: raw.tags,
            nodes: raw.nodes,
            source: raw.source,
        }
    }
}

/// Apply `policy` to audit violations followed by heuristic violations.
///
/// Rules the policy does not know pass through with a severity derived from
/// their impact.
pub fn aggregate(
    policy: &EffectivePolicy,
    audit: Vec<RawViolation>,
    heuristic: Vec<RawViolation>,
) -> Vec<EffectiveViolation> {
    audit
        .into_iter()
        .chain(heuristic)
        .filter_map(|raw| match policy.lookup(&raw.rule_id) {
            Some(resolved) if !resolved.is_active() => {
                debug!("Dropping violation of disabled rule {}", raw.rule_id);
                None
            }
            Some(resolved) => Some(EffectiveViolation::from_raw(raw, resolved.severity)),
            None => {
                let severity = Severity::from_impact(raw.impact);
                Some(EffectiveViolation::from_raw(raw, severity))
            }
        })
        .collect()
}

/// Attach PNG screenshots to violating nodes, in order, until `max` have
/// been captured. A failed capture is skipped. Returns the number captured.
pub async fn capture_evidence(
    page: &dyn BrowserPage,
    violations: &mut [EffectiveViolation],
    max: usize,
) -> usize {
    let mut captured = 0;
    for node in violations.iter_mut().flat_map(|v| v.nodes.iter_mut()) {
        if captured >= max {
            break;
        }
        if node.selector.is_empty() {
            continue;
        }
        match page.screenshot(&node.selector).await {
            Ok(png) => {
                node.screenshot = Some(format!("data:image/png;base64,{}", STANDARD.encode(png)));
                captured += 1;
                debug!("Captured screenshot {}/{} for {}", captured, max, node.selector);
            }
            Err(e) => debug!("Could not capture screenshot for {}: {}", node.selector, e),
        }
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckRegistry;
    use aoda_scanner::ScanError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw(rule_id: &str, impact: Impact, selectors: &[&str]) -> RawViolation {
        RawViolation {
            rule_id: rule_id.to_string(),
            impact,
            description: String::new(),
            help: String::new(),
            help_url: String::new(),
            tags: Vec::new(),
            nodes: selectors.iter().map(|s| NodeRef::new(*s)).collect(),
            source: RuleSource::Audit,
        }
    }

    #[test]
    fn test_disabled_rule_is_dropped() {
        let policy = CheckRegistry::with_defaults().effective_policy(None);
        let out = aggregate(
            &policy,
            vec![
                raw("color-contrast-enhanced", Impact::Serious, &["p"]),
                raw("image-alt", Impact::Critical, &["img"]),
            ],
            Vec::new(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rule_id, "image-alt");
        assert_eq!(out[0].severity, Severity::Error);
    }

    #[test]
    fn test_configured_severity_replaces_impact() {
        let policy = CheckRegistry::with_defaults().effective_policy(None);
        let out = aggregate(&policy, vec![raw("heading-order", Impact::Moderate, &["h3"])], Vec::new());
        assert_eq!(out[0].severity, Severity::Alert);
        assert_eq!(out[0].impact, Impact::Moderate);
    }

    #[test]
    fn test_user_override_applies() {
        let mut registry = CheckRegistry::with_defaults();
        registry
            .set_override("alice", "color-contrast", true, Severity::Warning)
            .unwrap();
        registry
            .set_override("alice", "label", true, Severity::Disabled)
            .unwrap();
        let policy = registry.effective_policy(Some("alice"));

        let out = aggregate(
            &policy,
            vec![
                raw("color-contrast", Impact::Serious, &["a"]),
                raw("label", Impact::Critical, &["input"]),
            ],
            Vec::new(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Warning);
    }

    #[test]
    fn test_unrecognized_rule_passes_through() {
        let policy = CheckRegistry::with_defaults().effective_policy(None);
        let out = aggregate(&policy, vec![raw("region", Impact::Moderate, &["div"])], Vec::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Warning);
    }

    #[test]
    fn test_audit_violations_precede_heuristic_ones() {
        let policy = EffectivePolicy::default();
        let mut heuristic = raw("noscript-element", Impact::Minor, &["noscript"]);
        heuristic.source = RuleSource::Heuristic;
        let out = aggregate(
            &policy,
            vec![raw("image-alt", Impact::Critical, &["img"])],
            vec![heuristic],
        );
        let ids: Vec<&str> = out.iter().map(|v| v.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["image-alt", "noscript-element"]);
    }

    struct ShotPage {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BrowserPage for ShotPage {
        async fn title(&self) -> aoda_scanner::error::Result<Option<String>> {
            Ok(None)
        }
        async fn status(&self) -> aoda_scanner::error::Result<Option<u16>> {
            Ok(None)
        }
        async fn content(&self) -> aoda_scanner::error::Result<String> {
            Ok(String::new())
        }
        async fn evaluate(&self, _script: &str) -> aoda_scanner::error::Result<Value> {
            Ok(Value::Null)
        }
        async fn screenshot(&self, selector: &str) -> aoda_scanner::error::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if selector == "#gone" {
                Err(ScanError::Screenshot("element detached".into()))
            } else {
                Ok(vec![0x89, b'P', b'N', b'G'])
            }
        }
        async fn close(&self) -> aoda_scanner::error::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_evidence_is_capped_and_failures_skipped() {
        let policy = EffectivePolicy::default();
        let mut violations = aggregate(
            &policy,
            vec![
                raw("image-alt", Impact::Critical, &["#gone", "img.a", ""]),
                raw("link-name", Impact::Serious, &["a.b", "a.c"]),
            ],
            Vec::new(),
        );
        let page = ShotPage {
            calls: AtomicUsize::new(0),
        };

        let captured = capture_evidence(&page, &mut violations, 2).await;

        assert_eq!(captured, 2);
        assert_eq!(page.calls.load(Ordering::SeqCst), 3);
        assert!(violations[0].nodes[0].screenshot.is_none());
        assert!(
            violations[0].nodes[1]
                .screenshot
                .as_deref()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
        assert!(violations[1].nodes[0].screenshot.is_some());
        assert!(violations[1].nodes[1].screenshot.is_none());
    }
}
