use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out after {0} ms")]
    Timeout(u64),

    #[error("Audit engine error: {0}")]
    Audit(String),

    #[error("Unrecognised audit response shape: {0}")]
    UnknownAuditShape(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Browser engine unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    /// Errors that make the browser engine itself unusable. Everything else
    /// is scoped to a single page and never ends the scan.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::BrowserUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
