// Two-tier check configuration: global rows plus per-user overrides

use crate::error::{CoreError, Result};
use aoda_scanner::Impact;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Alert,
    Disabled,
}

impl Severity {
    /// Severities that can appear on a reported violation.
    pub const REPORTED: [Severity; 3] = [Severity::Error, Severity::Warning, Severity::Alert];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Alert => "alert",
            Severity::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "alert" => Some(Severity::Alert),
            "disabled" => Some(Severity::Disabled),
            _ => None,
        }
    }

    /// Severity for a rule with no configuration row.
    pub fn from_impact(impact: Impact) -> Self {
        match impact {
            Impact::Critical | Impact::Serious => Severity::Error,
            Impact::Moderate => Severity::Warning,
            Impact::Minor => Severity::Alert,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Axe,
    Custom,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WcagLevel {
    A,
    AA,
    AAA,
}

/// One rule in the global registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub check_id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub severity: Severity,
    pub wcag_criterion: Option<String>,
    pub wcag_level: Option<WcagLevel>,
    pub aoda_required: bool,
    pub wcag21_only: bool,
    pub check_type: CheckType,
    pub help_url: String,
    pub tags: Vec<String>,
}

/// A user's replacement for a rule's `enabled`/`severity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOverride {
    pub user_id: String,
    pub check_id: String,
    pub enabled: bool,
    pub severity: Severity,
}

/// Final enable/severity decision for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCheck {
    pub enabled: bool,
    pub severity: Severity,
}

impl ResolvedCheck {
    /// A rule reports violations only when enabled with a non-disabled
    /// severity.
    pub fn is_active(&self) -> bool {
        self.enabled && self.severity != Severity::Disabled
    }
}

/// Outcome of a two-tier lookup, tagged with the tier that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No global row; the violation passes through with its own impact.
    Unrecognized,
    Default(ResolvedCheck),
    Override(ResolvedCheck),
}

impl Resolution {
    pub fn resolved(&self) -> Option<ResolvedCheck> {
        match self {
            Resolution::Unrecognized => None,
            Resolution::Default(r) | Resolution::Override(r) => Some(*r),
        }
    }
}

/// The precedence rule: an override, when present, wins on `enabled` and
/// `severity`; otherwise the global row stands. An override without a
/// global row is ignored.
pub fn resolve(global: Option<&CheckConfig>, user_override: Option<&CheckOverride>) -> Resolution {
    let Some(global) = global else {
        return Resolution::Unrecognized;
    };
    match user_override {
        Some(o) => Resolution::Override(ResolvedCheck {
            enabled: o.enabled,
            severity: o.severity,
        }),
        None => Resolution::Default(ResolvedCheck {
            enabled: global.enabled,
            severity: global.severity,
        }),
    }
}

/// Resolved configuration for one user, computed once per scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectivePolicy {
    pub user_id: Option<String>,
    rules: HashMap<String, ResolvedCheck>,
}

impl EffectivePolicy {
    pub fn lookup(&self, rule_id: &str) -> Option<ResolvedCheck> {
        self.rules.get(rule_id).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Admin update to a global row. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckUpdate {
    pub check_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// On-disk form of registry changes: global updates and user overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecksFile {
    #[serde(default)]
    pub checks: Vec<CheckUpdate>,
    #[serde(default)]
    pub overrides: Vec<CheckOverride>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: BTreeMap<String, CheckConfig>,
    overrides: HashMap<(String, String), CheckOverride>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in rule table.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.seed_defaults();
        registry
    }

    /// Insert every built-in rule that is not present yet. Existing rows,
    /// including admin edits, are left alone. Returns how many were added.
    pub fn seed_defaults(&mut self) -> usize {
        let mut added = 0;
        for check in default_checks() {
            if !self.checks.contains_key(&check.check_id) {
                self.checks.insert(check.check_id.clone(), check);
                added += 1;
            }
        }
        if added > 0 {
            debug!("Seeded {} default checks", added);
        }
        added
    }

    pub fn insert(&mut self, check: CheckConfig) {
        self.checks.insert(check.check_id.clone(), check);
    }

    pub fn list(&self) -> Vec<&CheckConfig> {
        self.checks.values().collect()
    }

    pub fn get(&self, check_id: &str) -> Option<&CheckConfig> {
        self.checks.get(check_id)
    }

    pub fn update(&mut self, update: &CheckUpdate) -> Result<&CheckConfig> {
        let check = self
            .checks
            .get_mut(&update.check_id)
            .ok_or_else(|| CoreError::UnknownCheck(update.check_id.clone()))?;
        if let Some(enabled) = update.enabled {
            check.enabled = enabled;
        }
        if let Some(severity) = update.severity {
            check.severity = severity;
        }
        Ok(check)
    }

    /// Create or replace a user's override. The rule must exist globally.
    pub fn set_override(
        &mut self,
        user_id: &str,
        check_id: &str,
        enabled: bool,
        severity: Severity,
    ) -> Result<&CheckOverride> {
        if !self.checks.contains_key(check_id) {
            return Err(CoreError::UnknownCheck(check_id.to_string()));
        }
        let key = (user_id.to_string(), check_id.to_string());
        let entry = CheckOverride {
            user_id: user_id.to_string(),
            check_id: check_id.to_string(),
            enabled,
            severity,
        };
        self.overrides.insert(key.clone(), entry);
        Ok(&self.overrides[&key])
    }

    pub fn remove_override(&mut self, user_id: &str, check_id: &str) -> bool {
        self.overrides
            .remove(&(user_id.to_string(), check_id.to_string()))
            .is_some()
    }

    /// A user's overrides, ordered by check id.
    pub fn user_overrides(&self, user_id: &str) -> Vec<&CheckOverride> {
        let mut found: Vec<&CheckOverride> = self
            .overrides
            .values()
            .filter(|o| o.user_id == user_id)
            .collect();
        found.sort_by(|a, b| a.check_id.cmp(&b.check_id));
        found
    }

    /// Drop every override a user owns. Returns how many were removed.
    pub fn reset_user(&mut self, user_id: &str) -> usize {
        let before = self.overrides.len();
        self.overrides.retain(|(user, _), _| user != user_id);
        before - self.overrides.len()
    }

    pub fn resolve(&self, rule_id: &str, user_id: Option<&str>) -> Resolution {
        let user_override = user_id.and_then(|user| {
            self.overrides
                .get(&(user.to_string(), rule_id.to_string()))
        });
        resolve(self.checks.get(rule_id), user_override)
    }

    /// Resolve every registered rule for `user_id`.
    pub fn effective_policy(&self, user_id: Option<&str>) -> EffectivePolicy {
        let rules = self
            .checks
            .keys()
            .filter_map(|id| self.resolve(id, user_id).resolved().map(|r| (id.clone(), r)))
            .collect();
        EffectivePolicy {
            user_id: user_id.map(str::to_string),
            rules,
        }
    }

    /// Apply a checks file: global updates first, then user overrides.
    pub fn apply(&mut self, file: &ChecksFile) -> Result<()> {
        for update in &file.checks {
            self.update(update)?;
        }
        for o in &file.overrides {
            self.set_override(&o.user_id, &o.check_id, o.enabled, o.severity)?;
        }
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let file: ChecksFile = serde_json::from_str(&content)?;
        self.apply(&file)?;
        info!(
            "Loaded {} check updates and {} overrides from {}",
            file.checks.len(),
            file.overrides.len(),
            path.display()
        );
        Ok(())
    }

    /// Current global state and all overrides, in the form [`Self::apply`]
    /// reads back.
    pub fn to_file(&self) -> ChecksFile {
        let checks = self
            .checks
            .values()
            .map(|c| CheckUpdate {
                check_id: c.check_id.clone(),
                enabled: Some(c.enabled),
                severity: Some(c.severity),
            })
            .collect();
        let mut overrides: Vec<CheckOverride> = self.overrides.values().cloned().collect();
        overrides.sort_by(|a, b| (&a.user_id, &a.check_id).cmp(&(&b.user_id, &b.check_id)));
        ChecksFile { checks, overrides }
    }

    pub fn save_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.to_file())?)?;
        Ok(())
    }
}

struct DefaultCheck {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    enabled: bool,
    severity: Severity,
    criterion: &'static str,
    level: WcagLevel,
    aoda_required: bool,
    check_type: CheckType,
    help_url: Option<&'static str>,
    tags: &'static [&'static str],
}

const AXE_HELP_BASE: &str = "https://dequeuniversity.com/rules/axe/4.4/";

const DEFAULT_CHECKS: &[DefaultCheck] = &[
    DefaultCheck {
        id: "image-alt",
        name: "Images must have alternative text",
        description: "Ensures <img> elements have alternate text or a role of none or presentation",
        enabled: true,
        severity: Severity::Error,
        criterion: "1.1.1",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.text-alternatives", "wcag2a", "wcag111", "section508"],
    },
    DefaultCheck {
        id: "spacer-image-alt",
        name: "Decorative spacer images should have empty alt attribute",
        description: "Ensures decorative spacer images have alt=\"\" so screen readers skip them",
        enabled: true,
        severity: Severity::Error,
        criterion: "1.1.1",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Custom,
        help_url: Some("https://www.w3.org/WAI/WCAG21/Understanding/non-text-content.html"),
        tags: &["cat.text-alternatives", "wcag2a", "wcag111"],
    },
    DefaultCheck {
        id: "empty-heading",
        name: "Headings must not be empty",
        description: "Ensures headings have discernible text",
        enabled: true,
        severity: Severity::Error,
        criterion: "2.4.6",
        level: WcagLevel::AA,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.name-role-value", "wcag2aa", "wcag246"],
    },
    DefaultCheck {
        id: "heading-order",
        name: "Heading levels should only increase by one",
        description: "Ensures heading levels are in a sequentially descending order",
        enabled: true,
        severity: Severity::Alert,
        criterion: "1.3.1",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.semantics", "wcag2a", "wcag131"],
    },
    DefaultCheck {
        id: "p-as-heading",
        name: "Bold, italic text and font-size should not be used to style p elements as headings",
        description: "Detects paragraphs that look like headings",
        enabled: true,
        severity: Severity::Alert,
        criterion: "1.3.1",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.semantics", "wcag2a", "wcag131"],
    },
    DefaultCheck {
        id: "color-contrast",
        name: "Elements must have sufficient color contrast",
        description: "Ensures foreground and background colors meet WCAG 2 AA contrast ratio thresholds",
        enabled: true,
        severity: Severity::Error,
        criterion: "1.4.3",
        level: WcagLevel::AA,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.color", "wcag2aa", "wcag143"],
    },
    DefaultCheck {
        id: "color-contrast-enhanced",
        name: "Elements must have sufficient color contrast (enhanced)",
        description: "Ensures foreground and background colors meet WCAG 2 AAA contrast ratio thresholds",
        enabled: false,
        severity: Severity::Warning,
        criterion: "1.4.6",
        level: WcagLevel::AAA,
        aoda_required: false,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.color", "wcag2aaa", "wcag146"],
    },
    DefaultCheck {
        id: "frame-title",
        name: "Frames must have an accessible name",
        description: "Ensures <iframe> and <frame> elements have an accessible name",
        enabled: true,
        severity: Severity::Error,
        criterion: "4.1.2",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.text-alternatives", "wcag2a", "wcag412", "section508"],
    },
    DefaultCheck {
        id: "noscript-element",
        name: "Noscript elements should provide alternative content",
        description: "Detects noscript elements that may indicate JavaScript dependency",
        enabled: true,
        severity: Severity::Alert,
        criterion: "4.1.2",
        level: WcagLevel::A,
        aoda_required: false,
        check_type: CheckType::Custom,
        help_url: Some("https://www.w3.org/TR/WCAG20-TECHS/G173.html"),
        tags: &["cat.parsing", "best-practice"],
    },
    DefaultCheck {
        id: "link-name",
        name: "Links must have discernible text",
        description: "Ensures links have discernible text",
        enabled: true,
        severity: Severity::Error,
        criterion: "2.4.4",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.name-role-value", "wcag2a", "wcag244", "section508"],
    },
    DefaultCheck {
        id: "label",
        name: "Form elements must have labels",
        description: "Ensures every form element has a label",
        enabled: true,
        severity: Severity::Error,
        criterion: "3.3.2",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.forms", "wcag2a", "wcag332", "section508"],
    },
    DefaultCheck {
        id: "document-title",
        name: "Documents must have a title element",
        description: "Ensures each HTML document contains a non-empty <title> element",
        enabled: true,
        severity: Severity::Error,
        criterion: "2.4.2",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.text-alternatives", "wcag2a", "wcag242"],
    },
    DefaultCheck {
        id: "html-has-lang",
        name: "HTML element must have a lang attribute",
        description: "Ensures every HTML document has a lang attribute",
        enabled: true,
        severity: Severity::Error,
        criterion: "3.1.1",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.language", "wcag2a", "wcag311"],
    },
    DefaultCheck {
        id: "bypass",
        name: "Page must have a skip link",
        description: "Ensures each page has at least one mechanism for a keyboard user to bypass navigation",
        enabled: true,
        severity: Severity::Error,
        criterion: "2.4.1",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.keyboard", "wcag2a", "wcag241", "section508"],
    },
    DefaultCheck {
        id: "aria-allowed-attr",
        name: "ARIA attributes must be allowed for element's role",
        description: "Ensures ARIA attributes are allowed for an element's role",
        enabled: true,
        severity: Severity::Error,
        criterion: "4.1.2",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.aria", "wcag2a", "wcag412"],
    },
    DefaultCheck {
        id: "aria-required-attr",
        name: "ARIA roles must have required attributes",
        description: "Ensures elements with ARIA roles have all required ARIA attributes",
        enabled: true,
        severity: Severity::Error,
        criterion: "4.1.2",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.aria", "wcag2a", "wcag412"],
    },
    DefaultCheck {
        id: "aria-valid-attr",
        name: "ARIA attributes must be valid",
        description: "Ensures attributes that begin with aria- are valid ARIA attributes",
        enabled: true,
        severity: Severity::Error,
        criterion: "4.1.2",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.aria", "wcag2a", "wcag412"],
    },
    DefaultCheck {
        id: "aria-valid-attr-value",
        name: "ARIA attribute values must be valid",
        description: "Ensures all ARIA attributes have valid values",
        enabled: true,
        severity: Severity::Error,
        criterion: "4.1.2",
        level: WcagLevel::A,
        aoda_required: true,
        check_type: CheckType::Axe,
        help_url: None,
        tags: &["cat.aria", "wcag2a", "wcag412"],
    },
];

/// The built-in rule table.
pub fn default_checks() -> Vec<CheckConfig> {
    DEFAULT_CHECKS
        .iter()
        .map(|d| CheckConfig {
            check_id: d.id.to_string(),
            name: d.name.to_string(),
            description: d.description.to_string(),
            enabled: d.enabled,
            severity: d.severity,
            wcag_criterion: Some(d.criterion.to_string()),
            wcag_level: Some(d.level),
            aoda_required: d.aoda_required,
            wcag21_only: false,
            check_type: d.check_type,
            help_url: d
                .help_url
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}{}", AXE_HELP_BASE, d.id)),
            tags: d.tags.iter().map(|t| t.to_string()).collect(),
        })
        .collect()
}
