// Fake browser and audit engine shared by the integration tests

#![allow(dead_code)]

use aoda_core::{CheckRegistry, ScanRunner, Settings};
use aoda_scanner::error::Result;
use aoda_scanner::{AuditEngine, Browser, BrowserPage, ScanError};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LOCATION_JS: &str = "window.location.href";

#[derive(Clone)]
pub enum FakeResponse {
    Html(String),
    Timeout,
    Crash,
}

#[derive(Default)]
pub struct FakeBrowser {
    pages: HashMap<String, FakeResponse>,
    pub opened: Mutex<Vec<String>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages
            .insert(url.to_string(), FakeResponse::Html(html.to_string()));
        self
    }

    pub fn respond(mut self, url: &str, response: FakeResponse) -> Self {
        self.pages.insert(url.to_string(), response);
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn BrowserPage>> {
        self.opened.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(FakeResponse::Html(html)) => Ok(Box::new(FakePage {
                url: url.to_string(),
                html: html.clone(),
            })),
            Some(FakeResponse::Timeout) => Err(ScanError::Timeout(timeout.as_millis() as u64)),
            Some(FakeResponse::Crash) => {
                Err(ScanError::BrowserUnavailable("browser process exited".into()))
            }
            None => Err(ScanError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED {}", url))),
        }
    }
}

pub struct FakePage {
    url: String,
    html: String,
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn title(&self) -> Result<Option<String>> {
        Ok(Some(format!("Title of {}", self.url)))
    }

    async fn status(&self) -> Result<Option<u16>> {
        Ok(Some(200))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        if script == LOCATION_JS {
            Ok(Value::String(self.url.clone()))
        } else {
            Ok(Value::Null)
        }
    }

    async fn screenshot(&self, _selector: &str) -> Result<Vec<u8>> {
        Ok(vec![1, 2, 3])
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Returns a canned response per page URL; pages without one pass cleanly.
#[derive(Default)]
pub struct FakeEngine {
    responses: HashMap<String, Value>,
    pub tags_seen: Mutex<Vec<Vec<String>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response(mut self, url: &str, value: Value) -> Self {
        self.responses.insert(url.to_string(), value);
        self
    }
}

#[async_trait]
impl AuditEngine for FakeEngine {
    async fn run(&self, page: &dyn BrowserPage, tags: &[String]) -> Result<Value> {
        self.tags_seen.lock().unwrap().push(tags.to_vec());
        let url = page.evaluate(LOCATION_JS).await?;
        let url = url.as_str().unwrap_or_default();
        Ok(self
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| json!({ "violations": [], "passes": [{ "id": "document-title" }] })))
    }
}

pub fn violation(rule_id: &str, impact: &str, selectors: &[&str]) -> Value {
    json!({
        "id": rule_id,
        "impact": impact,
        "description": format!("{} description", rule_id),
        "help": format!("{} help", rule_id),
        "helpUrl": format!("https://dequeuniversity.com/rules/axe/4.4/{}", rule_id),
        "tags": ["wcag2a"],
        "nodes": selectors.iter().map(|s| json!({ "target": [s], "html": "<x>" })).collect::<Vec<_>>()
    })
}

pub fn quiet_settings() -> Settings {
    Settings {
        request_delay_ms: 0,
        navigation_timeout_ms: 1_000,
        ..Settings::default()
    }
}

pub fn runner(browser: FakeBrowser, engine: FakeEngine) -> ScanRunner {
    runner_with(Arc::new(browser), engine, CheckRegistry::with_defaults())
}

pub fn runner_with(
    browser: Arc<FakeBrowser>,
    engine: FakeEngine,
    registry: CheckRegistry,
) -> ScanRunner {
    ScanRunner::new(browser, Arc::new(engine), Arc::new(registry)).with_settings(quiet_settings())
}

/// Markup with one anchor per href.
pub fn links(hrefs: &[&str]) -> String {
    let anchors: String = hrefs
        .iter()
        .map(|h| format!("<a href=\"{}\">{}</a>", h, h))
        .collect();
    format!("<html><head><title>t</title></head><body>{}</body></html>", anchors)
}
