use serde::{Deserialize, Serialize};

/// Raw impact tag as reported by an audit source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl Impact {
    pub const ALL: [Impact; 4] = [
        Impact::Critical,
        Impact::Serious,
        Impact::Moderate,
        Impact::Minor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Critical => "critical",
            Impact::Serious => "serious",
            Impact::Moderate => "moderate",
            Impact::Minor => "minor",
        }
    }

    /// Parse an impact tag; anything unknown (including a missing tag) is
    /// treated as `minor`.
    pub fn parse_lenient(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("critical") => Impact::Critical,
            Some("serious") => Impact::Serious,
            Some("moderate") => Impact::Moderate,
            _ => Impact::Minor,
        }
    }
}

/// Where a violation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    Audit,
    Heuristic,
}

/// One affected DOM element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeRef {
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
    /// PNG evidence as a `data:` URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl NodeRef {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }
}

/// An accessibility issue before severity policy is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawViolation {
    pub rule_id: String,
    pub impact: Impact,
    pub description: String,
    pub help: String,
    pub help_url: String,
    pub tags: Vec<String>,
    pub nodes: Vec<NodeRef>,
    pub source: RuleSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient() {
        assert_eq!(Impact::parse_lenient(Some("Serious")), Impact::Serious);
        assert_eq!(Impact::parse_lenient(Some("critical")), Impact::Critical);
        assert_eq!(Impact::parse_lenient(Some("bogus")), Impact::Minor);
        assert_eq!(Impact::parse_lenient(None), Impact::Minor);
    }

    #[test]
    fn test_impact_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Impact::Moderate).unwrap(), "\"moderate\"");
    }
}
