use aoda_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid scan request: {0}")]
    InvalidRequest(String),

    #[error("Unknown check: {0}")]
    UnknownCheck(String),

    #[error("Scan not found: {0}")]
    ScanNotFound(String),

    #[error("Scan {0} cannot be resumed: {1}")]
    NotResumable(String, String),

    #[error("Invalid setting {0}: {1}")]
    InvalidSetting(String, String),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
