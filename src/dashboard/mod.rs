//! Status Dashboard (C9), per spec.md §4.9.

use std::path::PathBuf;
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::download::DownloadProgress;

const FORCE_EMIT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub status_line: String,
    pub download_active: Vec<DownloadProgress>,
    pub download_queued: usize,
    pub download_completed: usize,
    pub upload_queued: usize,
    pub upload_completed: usize,
}

impl StageSnapshot {
    fn render(&self, started_at: Instant) -> String {
        let total = self.download_queued
            + self.download_active.len()
            + self.download_completed
            + self.upload_queued
            + self.upload_completed;
        let percent = if total == 0 { 0.0 } else { (self.upload_completed as f64 / total as f64) * 100.0 };
        let elapsed = started_at.elapsed().as_secs();

        let mut lines = Vec::new();
        lines.push(format!("=== pipeline status ({percent:.1}%) — elapsed {elapsed}s ==="));
        lines.push(format!("status: {}", self.status_line));
        lines.push("active downloads:".to_string());
        for item in self.download_active.iter().take(5) {
            let item_elapsed = item.started_at.elapsed().as_secs();
            lines.push(format!("  [w{}] {} ({}s)", item.worker_id, item.url, item_elapsed));
        }
        lines.push(format!(
            "downloads: active={} queued={} completed={}",
            self.download_active.len(),
            self.download_queued,
            self.download_completed
        ));
        lines.push(format!("uploads:   queued={} completed={}", self.upload_queued, self.upload_completed));
        lines.join("\n")
    }
}

struct State {
    last_rendered: Option<String>,
    last_emitted_at: Instant,
}

/// Periodic, throttled, change-detected render of pipeline state to an
/// append-only output stream.
pub struct Dashboard {
    state: Mutex<State>,
    started_at: Instant,
    output_path: PathBuf,
}

impl Dashboard {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            state: Mutex::new(State { last_rendered: None, last_emitted_at: Instant::now() }),
            started_at: Instant::now(),
            output_path: download_dir.join("logs").join("dashboard.log"),
        }
    }

    /// Renders `snapshot`; emits only if the rendered text changed, or
    /// at least every 30s regardless.
    pub async fn maybe_render(&self, snapshot: StageSnapshot) {
        let rendered = snapshot.render(self.started_at);
        let mut state = self.state.lock().await;

        let changed = state.last_rendered.as_deref() != Some(rendered.as_str());
        let force = state.last_emitted_at.elapsed() >= FORCE_EMIT_INTERVAL;

        if changed || force {
            self.append(&rendered).await;
            state.last_rendered = Some(rendered);
            state.last_emitted_at = Instant::now();
        }
    }

    async fn append(&self, text: &str) {
        if let Some(parent) = self.output_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(&self.output_path).await;
        if let Ok(mut file) = file {
            let _ = file.write_all(text.as_bytes()).await;
            let _ = file.write_all(b"\n\n").await;
        }
        tracing::info!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot(status: &str) -> StageSnapshot {
        StageSnapshot {
            status_line: status.to_string(),
            download_active: Vec::new(),
            download_queued: 0,
            download_completed: 0,
            upload_queued: 0,
            upload_completed: 0,
        }
    }

    #[test]
    fn render_includes_status_line() {
        let snapshot = empty_snapshot("scanning alpha");
        let rendered = snapshot.render(Instant::now());
        assert!(rendered.contains("scanning alpha"));
    }

    #[test]
    fn render_computes_percent_from_totals() {
        let mut snapshot = empty_snapshot("idle");
        snapshot.download_completed = 1;
        snapshot.upload_completed = 1;
        let rendered = snapshot.render(Instant::now());
        assert!(rendered.contains("100.0%"));
    }
}
