pub mod aggregate;
pub mod batch;
pub mod checks;
pub mod crawl;
pub mod error;
pub mod model;
pub mod report;
pub mod settings;
pub mod store;

pub use aggregate::EffectiveViolation;
pub use batch::{BatchProgress, BatchReport, BatchRunner, BatchStatus};
pub use checks::{CheckRegistry, EffectivePolicy, Resolution, Severity};
pub use crawl::{ScanProgressCallback, ScanRunner};
pub use error::CoreError;
pub use model::{PageResult, ScanMode, ScanRequest, ScanResult, ScanStatus};
pub use settings::Settings;
pub use store::{FileStore, MemoryStore, ScanStore};
