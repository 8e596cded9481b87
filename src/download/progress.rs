//! Per-item download progress record, written only by the worker that
//! owns it and read by the dashboard (C9).

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub worker_id: usize,
    pub url: String,
    pub bytes_read: u64,
    pub bytes_total: Option<u64>,
    pub started_at: Instant,
    pub status: String,
}

impl DownloadProgress {
    pub fn new(worker_id: usize, url: String) -> Self {
        Self {
            worker_id,
            url,
            bytes_read: 0,
            bytes_total: None,
            started_at: Instant::now(),
            status: "starting".to_string(),
        }
    }
}
