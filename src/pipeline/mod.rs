//! Pipeline Orchestrator (C7), per spec.md §4.7.
//!
//! Grounded on the teacher's `src/download/engine.rs` `process_queue`
//! (semaphore-bounded per-item tasks spawned from a worker loop) and
//! the `DashMap`-based concurrent-state pattern from
//! `src/download/rate_limiter.rs`, repurposed here for per-item
//! progress maps rather than per-domain rate state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{Duration, sleep};

use crate::dashboard::{Dashboard, StageSnapshot};
use crate::download::{AttemptOutcome, DownloadEngine, DownloadProgress};
use crate::fetch::PageFetcher;
use crate::model::Post;
use crate::store::Store;
use crate::upload::{UploadOutcome, Uploader};

const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);
const REFRESH_RETRIES: u32 = 2;

struct Queue {
    items: Mutex<VecDeque<Post>>,
}

impl Queue {
    fn new() -> Self {
        Self { items: Mutex::new(VecDeque::new()) }
    }

    async fn push(&self, item: Post) {
        self.items.lock().await.push_back(item);
    }

    async fn pop(&self) -> Option<Post> {
        self.items.lock().await.pop_front()
    }

    async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}

/// Owns the download/upload queues, bounded worker pools, and per-item
/// progress maps. Cheaply clonable; each worker task holds a clone.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<Store>,
    fetcher: Arc<PageFetcher>,
    download_engine: Arc<DownloadEngine>,
    uploader: Option<Arc<Uploader>>,
    download_queue: Arc<Queue>,
    upload_queue: Arc<Queue>,
    download_semaphore: Arc<Semaphore>,
    upload_semaphore: Arc<Semaphore>,
    download_progress: Arc<DashMap<String, DownloadProgress>>,
    completed_downloads: Arc<AtomicUsize>,
    completed_uploads: Arc<AtomicUsize>,
    status_line: Arc<Mutex<String>>,
    cancelled: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    dashboard: Arc<Dashboard>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        fetcher: Arc<PageFetcher>,
        download_engine: Arc<DownloadEngine>,
        uploader: Option<Arc<Uploader>>,
        download_workers: usize,
        upload_workers: usize,
        download_dir: std::path::PathBuf,
    ) -> Self {
        Self {
            store,
            fetcher,
            download_engine,
            uploader,
            download_queue: Arc::new(Queue::new()),
            upload_queue: Arc::new(Queue::new()),
            download_semaphore: Arc::new(Semaphore::new(download_workers.max(1))),
            upload_semaphore: Arc::new(Semaphore::new(upload_workers.max(1))),
            download_progress: Arc::new(DashMap::new()),
            completed_downloads: Arc::new(AtomicUsize::new(0)),
            completed_uploads: Arc::new(AtomicUsize::new(0)),
            status_line: Arc::new(Mutex::new(String::new())),
            cancelled: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            dashboard: Arc::new(Dashboard::new(download_dir)),
        }
    }

    /// Spawns the `D + U + 1` long-lived workers (download, upload,
    /// dashboard) and returns their join handles.
    pub fn start(&self, download_workers: usize, upload_workers: usize) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();
        for id in 0..download_workers {
            let me = self.clone();
            handles.push(tokio::spawn(async move { me.run_download_worker(id).await }));
        }
        let upload_workers = if self.uploader.is_some() { upload_workers } else { 0 };
        for id in 0..upload_workers {
            let me = self.clone();
            handles.push(tokio::spawn(async move { me.run_upload_worker(id).await }));
        }
        let me = self.clone();
        handles.push(tokio::spawn(async move { me.run_dashboard_worker().await }));
        handles
    }

    /// Appends to the download queue; non-blocking. Duplicate enqueues
    /// for the same url are allowed (the engine's pre-existing-file
    /// check and store uniqueness make them idempotent).
    pub async fn enqueue(&self, items: Vec<Post>) {
        for item in items {
            self.download_queue.push(item).await;
        }
    }

    /// Enqueues, then waits until both queues are empty and no worker
    /// is mid-item.
    pub async fn process_blocking(&self, items: Vec<Post>) {
        self.enqueue(items).await;
        loop {
            let idle = self.download_queue.len().await == 0
                && self.upload_queue.len().await == 0
                && self.in_flight.load(Ordering::SeqCst) == 0;
            if idle {
                return;
            }
            sleep(QUEUE_POLL_INTERVAL).await;
        }
    }

    /// Single-line status for the dashboard's current-activity header.
    /// Last writer wins.
    pub async fn update_status(&self, text: impl Into<String>) {
        *self.status_line.lock().await = text.into();
    }

    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Cancels the token and waits for workers to observe it, bounded
    /// by a grace period.
    pub async fn stop(&self, handles: Vec<tokio::task::JoinHandle<()>>) {
        self.cancelled.store(true, Ordering::SeqCst);
        let joined = futures_util::future::join_all(handles);
        let _ = tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, joined).await;
    }

    async fn run_download_worker(&self, worker_id: usize) {
        while !self.cancelled.load(Ordering::SeqCst) {
            let Some(item) = self.download_queue.pop().await else {
                sleep(QUEUE_POLL_INTERVAL).await;
                continue;
            };

            let permit = self.download_semaphore.clone().acquire_owned().await;
            let Ok(permit) = permit else { continue };
            self.in_flight.fetch_add(1, Ordering::SeqCst);

            self.download_progress.insert(item.url.clone(), DownloadProgress::new(worker_id, item.url.clone()));
            let outcome = self.run_download_item(worker_id, &item).await;
            self.download_progress.remove(&item.url);

            match outcome {
                Ok(()) => {
                    self.completed_downloads.fetch_add(1, Ordering::SeqCst);
                    if self.uploader.is_some() {
                        self.upload_queue.push(item).await;
                    }
                }
                Err(e) => tracing::warn!(url = %item.url, error = %e, "download item failed"),
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        }
    }

    async fn run_download_item(&self, worker_id: usize, item: &Post) -> Result<(), crate::download::DownloadError> {
        let Some(media_url) = item.media_source_url.clone() else {
            return Err(crate::download::DownloadError::invalid_url("no media_source_url set"));
        };
        let mut current_url = media_url;
        let mut refresh_attempts = 0;

        loop {
            let progress_map = self.download_progress.clone();
            let url_key = item.url.clone();
            let outcome = self
                .download_engine
                .download(&item.title, &item.post_id, &current_url, |p| {
                    let mut p = p.clone();
                    p.worker_id = worker_id;
                    progress_map.insert(url_key.clone(), p);
                })
                .await;

            match outcome {
                AttemptOutcome::Completed { path, .. } => {
                    if let Err(e) = self.store.mark_downloaded(&item.url, &path.display().to_string()).await {
                        tracing::error!(url = %item.url, error = %e, "failed to persist mark_downloaded");
                    }
                    return Ok(());
                }
                AttemptOutcome::Expired => {
                    if refresh_attempts >= REFRESH_RETRIES {
                        return Err(crate::download::DownloadError::refresh_exhausted(&item.url, refresh_attempts));
                    }
                    refresh_attempts += 1;
                    match self.fetcher.resolve_media_url(&item.url, &item.post_id, 2).await {
                        Ok(Some(new_url)) => {
                            if let Err(e) = self.store.update_media_url(&item.url, &new_url).await {
                                tracing::error!(url = %item.url, error = %e, "failed to persist refreshed media url");
                            }
                            current_url = new_url;
                            sleep(Duration::from_secs(1)).await;
                        }
                        Ok(None) => {
                            return Err(crate::download::DownloadError::refresh_exhausted(&item.url, refresh_attempts));
                        }
                        Err(e) => {
                            tracing::warn!(url = %item.url, error = %e, "resolve_media_url failed during refresh");
                            return Err(crate::download::DownloadError::refresh_exhausted(&item.url, refresh_attempts));
                        }
                    }
                }
                AttemptOutcome::Failed(e) => return Err(e),
            }
        }
    }

    async fn run_upload_worker(&self, worker_id: usize) {
        let Some(uploader) = self.uploader.clone() else { return };
        while !self.cancelled.load(Ordering::SeqCst) {
            let Some(item) = self.upload_queue.pop().await else {
                sleep(QUEUE_POLL_INTERVAL).await;
                continue;
            };

            let permit = self.upload_semaphore.clone().acquire_owned().await;
            let Ok(permit) = permit else { continue };
            self.in_flight.fetch_add(1, Ordering::SeqCst);

            let outcome = self.run_upload_item(&uploader, worker_id, &item).await;
            match outcome {
                Ok(Some(outcome)) => {
                    self.completed_uploads.fetch_add(1, Ordering::SeqCst);
                    if let Err(e) = self.store.mark_uploaded(&item.url, outcome.message_id.as_deref()).await {
                        tracing::error!(url = %item.url, error = %e, "failed to persist mark_uploaded");
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(url = %item.url, error = %e, "upload item failed"),
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        }
    }

    async fn run_upload_item(
        &self,
        uploader: &Uploader,
        _worker_id: usize,
        item: &Post,
    ) -> Result<Option<UploadOutcome>, crate::upload::UploadError> {
        let Some(path) = item.download_path.as_deref() else {
            return Err(crate::upload::UploadError::file_missing(&item.post_id));
        };
        let _ = self.store.touch_upload_attempt(&item.url).await;
        match uploader.upload(&item.title, &item.post_id, std::path::Path::new(path)).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => Err(e),
        }
    }

    async fn run_dashboard_worker(&self) {
        const TICK: Duration = Duration::from_secs(2);
        while !self.cancelled.load(Ordering::SeqCst) {
            let snapshot = self.build_snapshot().await;
            self.dashboard.maybe_render(snapshot).await;
            sleep(TICK).await;
        }
    }

    async fn build_snapshot(&self) -> StageSnapshot {
        let download_queued = self.download_queue.len().await;
        let upload_queued = self.upload_queue.len().await;
        let download_active: Vec<DownloadProgress> = self.download_progress.iter().map(|r| r.value().clone()).collect();

        StageSnapshot {
            status_line: self.status_line.lock().await.clone(),
            download_active,
            download_queued,
            download_completed: self.completed_downloads.load(Ordering::SeqCst),
            upload_queued,
            upload_completed: self.completed_uploads.load(Ordering::SeqCst),
        }
    }
}
