// Scan persistence: whole ScanResult values keyed by scan id

use crate::error::Result;
use crate::model::ScanResult;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

pub trait ScanStore: Send + Sync {
    /// Insert or replace the scan keyed by its id.
    fn put(&self, scan: &ScanResult) -> Result<()>;

    fn get(&self, scan_id: &str) -> Result<Option<ScanResult>>;

    /// All stored scans, newest first.
    fn list(&self) -> Result<Vec<ScanResult>>;
}

#[derive(Default)]
pub struct MemoryStore {
    scans: Mutex<HashMap<String, ScanResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScanStore for MemoryStore {
    fn put(&self, scan: &ScanResult) -> Result<()> {
        let mut scans = self.scans.lock().unwrap_or_else(|e| e.into_inner());
        scans.insert(scan.scan_id.clone(), scan.clone());
        Ok(())
    }

    fn get(&self, scan_id: &str) -> Result<Option<ScanResult>> {
        let scans = self.scans.lock().unwrap_or_else(|e| e.into_inner());
        Ok(scans.get(scan_id).cloned())
    }

    fn list(&self) -> Result<Vec<ScanResult>> {
        let scans = self.scans.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<ScanResult> = scans.values().cloned().collect();
        all.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(all)
    }
}

/// One JSON file per scan under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, scan_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", scan_id))
    }
}

impl ScanStore for FileStore {
    fn put(&self, scan: &ScanResult) -> Result<()> {
        let path = self.path_for(&scan.scan_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(scan)?)?;
        fs::rename(&tmp, &path)?;
        debug!("Checkpointed scan {} to {}", scan.scan_id, path.display());
        Ok(())
    }

    fn get(&self, scan_id: &str) -> Result<Option<ScanResult>> {
        let path = self.path_for(scan_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&content)?))
    }

    fn list(&self) -> Result<Vec<ScanResult>> {
        let mut all = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(&path)
                .map_err(crate::error::CoreError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<ScanResult>(&bytes)?))
            {
                Ok(scan) => all.push(scan),
                Err(e) => warn!("Skipping unreadable scan file {}: {}", path.display(), e),
            }
        }
        all.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(all)
    }
}
