// Browser automation seam and the headless Chromium implementation

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Launches page contexts.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh page and navigate it to `url`, giving up after `timeout`.
    ///
    /// Navigation problems come back as [`ScanError::Navigation`] or
    /// [`ScanError::Timeout`]; [`ScanError::BrowserUnavailable`] means the
    /// engine itself is gone.
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn BrowserPage>>;
}

/// A loaded, interactive page.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn title(&self) -> Result<Option<String>>;

    /// HTTP status of the main document, when the engine exposes it.
    async fn status(&self) -> Result<Option<u16>>;

    /// Rendered markup after scripts ran.
    async fn content(&self) -> Result<String>;

    /// Address the page ended up at after redirects.
    async fn url(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Evaluate a script, awaiting any returned promise, and return its
    /// JSON value.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// PNG screenshot of the first element matching `selector`.
    async fn screenshot(&self, selector: &str) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}

const NAVIGATION_STATUS_JS: &str = "(() => { const e = performance.getEntriesByType('navigation')[0]; \
     return e && e.responseStatus ? e.responseStatus : null; })()";

/// Headless Chromium driven through chromiumoxide.
pub struct ChromiumBrowser {
    browser: CdpBrowser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .build()
            .map_err(ScanError::BrowserUnavailable)?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| ScanError::BrowserUnavailable(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        Ok(Self { browser, handler })
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        self.handler.abort();
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn BrowserPage>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScanError::BrowserUnavailable(e.to_string()))?;

        let outcome = tokio::time::timeout(timeout, async { page.goto(url).await.map(|_| ()) }).await;
        let error = match outcome {
            Ok(Ok(_)) => return Ok(Box::new(ChromiumPage { page })),
            Ok(Err(e)) => ScanError::Navigation(e.to_string()),
            Err(_) => ScanError::Timeout(timeout.as_millis() as u64),
        };

        if let Err(e) = page.close().await {
            debug!("Failed to close page after navigation error: {}", e);
        }
        Err(error)
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn title(&self) -> Result<Option<String>> {
        self.page
            .get_title()
            .await
            .map_err(|e| ScanError::Navigation(e.to_string()))
    }

    async fn status(&self) -> Result<Option<u16>> {
        let value = self.evaluate(NAVIGATION_STATUS_JS).await?;
        Ok(value.as_u64().and_then(|s| u16::try_from(s).ok()))
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| ScanError::Navigation(e.to_string()))
    }

    async fn url(&self) -> Result<Option<String>> {
        self.page
            .url()
            .await
            .map_err(|e| ScanError::Navigation(e.to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(ScanError::Audit)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| ScanError::Audit(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn screenshot(&self, selector: &str) -> Result<Vec<u8>> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ScanError::Screenshot(e.to_string()))?;

        element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| ScanError::Screenshot(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| ScanError::Navigation(e.to_string()))
    }
}
