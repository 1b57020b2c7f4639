// Batch mode: several independent scans over a bounded worker pool

use crate::crawl::ScanRunner;
use crate::error::{CoreError, Result};
use crate::model::{ScanRequest, ScanResult, ScanStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_BATCH_URLS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Completed,
    Cancelled,
}

/// Shared bookkeeping for a running batch. This is the only state scans in
/// a batch share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub batch_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub in_progress: usize,
    pub current_url: Option<String>,
    pub scan_ids: Vec<String>,
    pub failed_urls: Vec<String>,
    pub status: BatchStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl BatchProgress {
    fn new(total: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4().to_string(),
            total,
            completed: 0,
            failed: 0,
            cancelled: 0,
            in_progress: 0,
            current_url: None,
            scan_ids: Vec::new(),
            failed_urls: Vec::new(),
            status: BatchStatus::Running,
            start_time: Utc::now(),
            end_time: None,
        }
    }

    /// Scans that reached a terminal state.
    pub fn finished(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }
}

pub type BatchProgressCallback = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

/// Outcome of a batch: final bookkeeping plus every scan that ran, in input
/// order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub progress: BatchProgress,
    pub scans: Vec<ScanResult>,
}

pub struct BatchRunner {
    runner: Arc<ScanRunner>,
    cancel_flag: Arc<AtomicBool>,
    concurrency: usize,
    progress_callback: Option<BatchProgressCallback>,
}

impl BatchRunner {
    /// Wrap `runner`; the batch's cancel flag is installed on it so running
    /// scans stop between pages.
    pub fn new(runner: ScanRunner) -> Self {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let concurrency = runner.settings().batch_concurrency.max(1);
        let runner = runner.with_cancel_flag(cancel_flag.clone());
        Self {
            runner: Arc::new(runner),
            cancel_flag,
            concurrency,
            progress_callback: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: BatchProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Setting this flag cancels the batch.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    /// Scan every URL with `template`'s settings, at most `concurrency` at a
    /// time. Scans not yet started when the batch is cancelled are skipped.
    pub async fn run(&self, urls: Vec<String>, template: ScanRequest) -> Result<BatchReport> {
        if urls.is_empty() {
            return Err(CoreError::InvalidRequest("No URLs provided".to_string()));
        }
        if urls.len() > MAX_BATCH_URLS {
            return Err(CoreError::InvalidRequest(format!(
                "Batch of {} URLs exceeds the limit of {}",
                urls.len(),
                MAX_BATCH_URLS
            )));
        }

        let progress = Arc::new(Mutex::new(BatchProgress::new(urls.len())));
        let batch_id = progress.lock().await.batch_id.clone();
        info!(
            "Starting batch {} of {} URLs with {} workers",
            batch_id,
            urls.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::new();

        for (index, url) in urls.into_iter().enumerate() {
            let runner = self.runner.clone();
            let semaphore = semaphore.clone();
            let progress = progress.clone();
            let cancel_flag = self.cancel_flag.clone();
            let callback = self.progress_callback.clone();
            let mut request = template.clone();
            request.seed_url = url.clone();

            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };

                if cancel_flag.load(Ordering::SeqCst) {
                    let mut p = progress.lock().await;
                    p.cancelled += 1;
                    report(&callback, &p);
                    return None;
                }

                {
                    let mut p = progress.lock().await;
                    p.in_progress += 1;
                    p.current_url = Some(url.clone());
                    report(&callback, &p);
                }

                let outcome = runner.run(request).await;

                let mut p = progress.lock().await;
                p.in_progress -= 1;
                let scan = match outcome {
                    Ok(scan) => {
                        p.scan_ids.push(scan.scan_id.clone());
                        match scan.status {
                            ScanStatus::Failed => {
                                p.failed += 1;
                                p.failed_urls.push(url);
                            }
                            ScanStatus::Cancelled => p.cancelled += 1,
                            _ => p.completed += 1,
                        }
                        Some((index, scan))
                    }
                    Err(e) => {
                        warn!("Batch scan of {} rejected: {}", url, e);
                        p.failed += 1;
                        p.failed_urls.push(url);
                        None
                    }
                };
                report(&callback, &p);
                scan
            }));
        }

        let mut scans = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Some(scan)) => scans.push(scan),
                Ok(None) => {}
                Err(e) => warn!("Batch worker task failed: {}", e),
            }
        }
        scans.sort_by_key(|(index, _)| *index);

        let mut final_progress = progress.lock().await.clone();
        final_progress.current_url = None;
        final_progress.status = if self.cancel_flag.load(Ordering::SeqCst) {
            BatchStatus::Cancelled
        } else {
            BatchStatus::Completed
        };
        final_progress.end_time = Some(Utc::now());
        info!(
            "Batch {} finished: {} completed, {} failed, {} cancelled",
            batch_id, final_progress.completed, final_progress.failed, final_progress.cancelled
        );

        Ok(BatchReport {
            progress: final_progress,
            scans: scans.into_iter().map(|(_, scan)| scan).collect(),
        })
    }
}

fn report(callback: &Option<BatchProgressCallback>, progress: &BatchProgress) {
    if let Some(cb) = callback {
        cb(progress);
    }
}
