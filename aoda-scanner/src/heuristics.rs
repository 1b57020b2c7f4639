// Local accessibility checks that run on static markup

use crate::violation::{Impact, NodeRef, RawViolation, RuleSource};
use scraper::{ElementRef, Html, Selector};

pub const SPACER_IMAGE_RULE: &str = "spacer-image-alt";
pub const NOSCRIPT_RULE: &str = "noscript-element";

/// Rule ids owned by the local checks.
pub const HEURISTIC_RULES: &[&str] = &[SPACER_IMAGE_RULE, NOSCRIPT_RULE];

const SPACER_PATTERNS: &[&str] = &[
    "spacer",
    "blank",
    "transparent",
    "pixel",
    "1x1",
    "dot.gif",
    "clear.gif",
    "shim",
];

const SNIPPET_LEN: usize = 200;

/// A check over parsed markup.
pub trait Heuristic: Send + Sync {
    fn rule_id(&self) -> &'static str;

    fn check(&self, document: &Html) -> Vec<RawViolation>;
}

/// Flags decorative spacer images whose `alt` is anything but `""`.
pub struct SpacerImageCheck;

impl Heuristic for SpacerImageCheck {
    fn rule_id(&self) -> &'static str {
        SPACER_IMAGE_RULE
    }

    fn check(&self, document: &Html) -> Vec<RawViolation> {
        let Ok(img_selector) = Selector::parse("img") else {
            return Vec::new();
        };

        let mut violations = Vec::new();
        for img in document.select(&img_selector) {
            let reasons = spacer_reasons(&img);
            if reasons.is_empty() {
                continue;
            }

            let alt = img.value().attr("alt");
            if alt == Some("") {
                continue;
            }

            let mut node = NodeRef::new(css_selector(&img));
            node.html = Some(snippet(&img));
            node.failure_summary = Some(format!(
                "Decorative spacer image has alt=\"{}\" but should have alt=\"\" ({})",
                alt.unwrap_or_default(),
                reasons.join(", ")
            ));

            violations.push(RawViolation {
                rule_id: SPACER_IMAGE_RULE.to_string(),
                impact: Impact::Moderate,
                description: "Decorative spacer images should have empty alt attribute (alt=\"\")"
                    .to_string(),
                help: "Decorative/spacer images should have alt=\"\" to hide them from screen readers, not descriptive text"
                    .to_string(),
                help_url: "https://www.w3.org/WAI/WCAG21/Understanding/non-text-content.html"
                    .to_string(),
                tags: tags(&["cat.text-alternatives", "wcag2a", "wcag111", "custom"]),
                nodes: vec![node],
                source: RuleSource::Heuristic,
            });
        }
        violations
    }
}

fn spacer_reasons(img: &ElementRef) -> Vec<String> {
    let mut reasons = Vec::new();
    let src = img.value().attr("src").unwrap_or_default().to_lowercase();

    if let Some(pattern) = SPACER_PATTERNS.iter().find(|p| src.contains(*p)) {
        reasons.push(format!("filename contains '{}'", pattern));
    }

    let is_one = |attr: &str| img.value().attr(attr).map(str::trim) == Some("1");
    if is_one("width") || is_one("height") {
        reasons.push("1px dimension".to_string());
    }
    reasons
}

/// Reports every `<noscript>` element as a possible JavaScript dependency.
pub struct NoscriptCheck;

impl Heuristic for NoscriptCheck {
    fn rule_id(&self) -> &'static str {
        NOSCRIPT_RULE
    }

    fn check(&self, document: &Html) -> Vec<RawViolation> {
        let Ok(selector) = Selector::parse("noscript") else {
            return Vec::new();
        };

        document
            .select(&selector)
            .map(|element| {
                let mut node = NodeRef::new(css_selector(&element));
                node.html = Some(snippet(&element));
                node.failure_summary = Some(
                    "Noscript element found - verify JavaScript alternatives are accessible"
                        .to_string(),
                );

                RawViolation {
                    rule_id: NOSCRIPT_RULE.to_string(),
                    impact: Impact::Minor,
                    description: "Noscript elements detected - ensure functionality is available without JavaScript"
                        .to_string(),
                    help: "Pages should be functional without JavaScript, or provide equivalent alternatives"
                        .to_string(),
                    help_url: "https://www.w3.org/TR/WCAG20-TECHS/G173.html".to_string(),
                    tags: tags(&["cat.parsing", "best-practice", "custom"]),
                    nodes: vec![node],
                    source: RuleSource::Heuristic,
                }
            })
            .collect()
    }
}

/// Run every local check against `html`.
pub fn run_heuristics(html: &str) -> Vec<RawViolation> {
    let document = Html::parse_document(html);
    let checks: Vec<Box<dyn Heuristic>> = vec![Box::new(SpacerImageCheck), Box::new(NoscriptCheck)];

    checks
        .iter()
        .flat_map(|check| check.check(&document))
        .collect()
}

/// Best-effort CSS selector: `#id`, then `tag.class`, then
/// `tag:nth-of-type(n)` among same-tag siblings, then the bare tag.
pub fn css_selector(element: &ElementRef) -> String {
    let value = element.value();
    let name = value.name();

    if let Some(id) = value.id().filter(|id| !id.is_empty()) {
        return format!("#{}", id);
    }

    if let Some(class) = value.classes().next() {
        return format!("{}.{}", name, class);
    }

    if let Some(parent) = element.parent() {
        let siblings: Vec<ElementRef> = parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|sibling| sibling.value().name() == name)
            .collect();
        if siblings.len() > 1
            && let Some(index) = siblings.iter().position(|s| s == element)
        {
            return format!("{}:nth-of-type({})", name, index + 1);
        }
    }

    name.to_string()
}

fn snippet(element: &ElementRef) -> String {
    element.html().chars().take(SNIPPET_LEN).collect()
}

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|t| t.to_string()).collect()
}
