// Audit engine adapter

use crate::browser::BrowserPage;
use crate::error::{Result, ScanError};
use crate::violation::{Impact, NodeRef, RawViolation, RuleSource};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Result categories reported by the engine.
pub const CATEGORIES: [&str; 4] = ["violations", "passes", "incomplete", "inapplicable"];

/// Envelopes and serialized payloads nest at most this deep.
const MAX_UNWRAP: usize = 3;

/// Runs an accessibility audit inside a loaded page.
#[async_trait]
pub trait AuditEngine: Send + Sync {
    /// Run the rules matching `tags` and return the engine's raw response.
    async fn run(&self, page: &dyn BrowserPage, tags: &[String]) -> Result<Value>;
}

/// axe-core, injected from a script file.
pub struct AxeEngine {
    source: String,
}

impl AxeEngine {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::new(source))
    }
}

#[async_trait]
impl AuditEngine for AxeEngine {
    async fn run(&self, page: &dyn BrowserPage, tags: &[String]) -> Result<Value> {
        let loaded = page.evaluate("typeof window.axe !== 'undefined'").await?;
        if loaded != Value::Bool(true) {
            debug!("Injecting axe-core into page");
            page.evaluate(&format!("{}\n;true", self.source)).await?;
        }

        let script = format!(
            "axe.run(document, {{ runOnly: {{ type: 'tag', values: {} }} }})",
            serde_json::to_string(tags)?
        );
        page.evaluate(&script).await
    }
}

/// Normalized audit result for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditOutcome {
    pub violations: Vec<RawViolation>,
    pub passes: usize,
    pub incomplete: usize,
    pub inapplicable: usize,
}

/// The outer shapes an engine response can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"response": ...}` wrapper around the real payload.
    Envelope,
    /// The payload serialized to a JSON string.
    Serialized,
    /// An object keyed by result category.
    Categories,
}

/// Classify a raw response. Anything that matches no known shape is an
/// error rather than an empty result.
pub fn classify(value: &Value) -> Result<ResponseShape> {
    match value {
        Value::String(_) => Ok(ResponseShape::Serialized),
        Value::Object(map) if map.contains_key("response") && !has_category(map) => {
            Ok(ResponseShape::Envelope)
        }
        Value::Object(map) if has_category(map) => Ok(ResponseShape::Categories),
        other => Err(ScanError::UnknownAuditShape(describe(other))),
    }
}

fn has_category(map: &Map<String, Value>) -> bool {
    CATEGORIES.iter().any(|c| map.contains_key(*c))
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).take(5).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
    }
}

/// Map a raw engine response onto an [`AuditOutcome`].
///
/// Missing categories count as empty. A category that is present but not a
/// list, or a response of unknown shape, is an error.
pub fn normalize_response(value: Value) -> Result<AuditOutcome> {
    let mut current = value;
    for _ in 0..=MAX_UNWRAP {
        current = match classify(&current)? {
            ResponseShape::Categories => return outcome_from_categories(current),
            ResponseShape::Envelope => match current {
                Value::Object(mut map) => map.remove("response").unwrap_or(Value::Null),
                other => other,
            },
            ResponseShape::Serialized => match current {
                Value::String(text) => serde_json::from_str(&text).map_err(|e| {
                    ScanError::UnknownAuditShape(format!("unparseable string payload: {}", e))
                })?,
                other => other,
            },
        };
    }
    Err(ScanError::UnknownAuditShape(
        "response nested too deeply".to_string(),
    ))
}

fn outcome_from_categories(value: Value) -> Result<AuditOutcome> {
    let Value::Object(mut map) = value else {
        return Err(ScanError::UnknownAuditShape(describe(&value)));
    };

    let violations = take_list(&mut map, "violations")?
        .into_iter()
        .map(parse_violation)
        .collect::<Result<Vec<_>>>()?;

    Ok(AuditOutcome {
        violations,
        passes: take_list(&mut map, "passes")?.len(),
        incomplete: take_list(&mut map, "incomplete")?.len(),
        inapplicable: take_list(&mut map, "inapplicable")?.len(),
    })
}

fn take_list(map: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ScanError::UnknownAuditShape(format!(
            "'{}' is {}, expected a list",
            key,
            describe(&other)
        ))),
    }
}

#[derive(Deserialize)]
struct AxeRule {
    id: String,
    impact: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    help: String,
    #[serde(default, rename = "helpUrl")]
    help_url: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    nodes: Vec<AxeNode>,
}

#[derive(Deserialize)]
struct AxeNode {
    #[serde(default)]
    target: Value,
    html: Option<String>,
    #[serde(rename = "failureSummary")]
    failure_summary: Option<String>,
}

fn parse_violation(value: Value) -> Result<RawViolation> {
    let rule: AxeRule = serde_json::from_value(value)
        .map_err(|e| ScanError::UnknownAuditShape(format!("malformed violation: {}", e)))?;

    let nodes = rule
        .nodes
        .into_iter()
        .map(|node| NodeRef {
            selector: target_selector(&node.target),
            html: node.html,
            failure_summary: node.failure_summary,
            screenshot: None,
        })
        .collect();

    Ok(RawViolation {
        rule_id: rule.id,
        impact: Impact::parse_lenient(rule.impact.as_deref()),
        description: rule.description,
        help: rule.help,
        help_url: rule.help_url,
        tags: rule.tags,
        nodes,
        source: RuleSource::Audit,
    })
}

/// First selector of an engine target. Targets inside frames or shadow
/// roots arrive as nested lists; the outermost selector is used.
fn target_selector(target: &Value) -> String {
    match target {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.first().map(target_selector).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Run `engine` on `page` and normalize what comes back.
pub async fn audit_page(
    engine: &dyn AuditEngine,
    page: &dyn BrowserPage,
    tags: &[String],
) -> Result<AuditOutcome> {
    let raw = engine.run(page, tags).await?;
    normalize_response(raw)
}
