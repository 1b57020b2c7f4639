// Process-wide scan policy

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const ENV_REQUEST_DELAY_MS: &str = "AODA_REQUEST_DELAY_MS";
pub const ENV_TIMEOUT_MS: &str = "AODA_TIMEOUT_MS";
pub const ENV_MAX_SCREENSHOTS: &str = "AODA_MAX_SCREENSHOTS_PER_PAGE";
pub const ENV_BATCH_CONCURRENCY: &str = "AODA_BATCH_CONCURRENCY";
pub const ENV_AXE_SCRIPT: &str = "AODA_AXE_SCRIPT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Pause after each page to throttle load on the target.
    pub request_delay_ms: u64,
    pub navigation_timeout_ms: u64,
    pub max_screenshots_per_page: usize,
    pub batch_concurrency: usize,
    pub axe_script: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_delay_ms: 200,
            navigation_timeout_ms: 20_000,
            max_screenshots_per_page: 5,
            batch_concurrency: 3,
            axe_script: PathBuf::from("axe.min.js"),
        }
    }
}

impl Settings {
    /// Defaults with `AODA_*` environment overrides applied.
    pub fn load_with_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. A present but unparseable value is an
    /// error rather than silently ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, ENV_REQUEST_DELAY_MS)? {
            self.request_delay_ms = v;
            debug!("Override request_delay_ms from env: {}", v);
        }
        if let Some(v) = parse_var(&lookup, ENV_TIMEOUT_MS)? {
            self.navigation_timeout_ms = v;
            debug!("Override navigation_timeout_ms from env: {}", v);
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_SCREENSHOTS)? {
            self.max_screenshots_per_page = v;
            debug!("Override max_screenshots_per_page from env: {}", v);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, ENV_BATCH_CONCURRENCY)? {
            if v == 0 {
                return Err(CoreError::InvalidSetting(
                    ENV_BATCH_CONCURRENCY.to_string(),
                    "must be at least 1".to_string(),
                ));
            }
            self.batch_concurrency = v;
            debug!("Override batch_concurrency from env: {}", v);
        }
        if let Some(path) = lookup(ENV_AXE_SCRIPT).filter(|p| !p.trim().is_empty()) {
            debug!("Override axe_script from env: {}", path);
            self.axe_script = PathBuf::from(path);
        }
        Ok(self)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| CoreError::InvalidSetting(key.to_string(), e.to_string())),
    }
}
