//! Automation Loop (C8), per spec.md §4.8.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::time::{Duration, sleep};

use crate::fetch::PageFetcher;
use crate::model::{Channel, PostCandidate};
use crate::pipeline::Orchestrator;
use crate::scanner::ChannelScanner;
use crate::store::Store;

const MONITORING_CAP: usize = 20;
const BETWEEN_CHANNEL_DELAY: Duration = Duration::from_secs(2);
const IDLE_POLL_DELAY: Duration = Duration::from_secs(45);
const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("store error: {0}")]
    Store(#[source] crate::store::StoreError),
}

pub struct AutomationLoop {
    store: Arc<Store>,
    fetcher: Arc<PageFetcher>,
    orchestrator: Arc<Orchestrator>,
    post_path_marker: String,
    cancelled: Arc<AtomicBool>,
}

impl AutomationLoop {
    pub fn new(
        store: Arc<Store>,
        fetcher: Arc<PageFetcher>,
        orchestrator: Arc<Orchestrator>,
        post_path_marker: String,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self { store, fetcher, orchestrator, post_path_marker, cancelled }
    }

    /// Runs until cancelled. Never awaits download or upload completion
    /// — the post-round enqueue into the orchestrator is fire-and-forget.
    ///
    /// The cycle delay is the literal 60 s from spec.md §4.8, not the
    /// `schedule.default_interval_minutes` config key (that key seeds
    /// `check_interval_min` for newly saved channels, a distinct value
    /// from how often this loop itself wakes up to check what's due).
    pub async fn run(&self) {
        while !self.cancelled.load(Ordering::SeqCst) {
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "automation cycle failed");
            }
            sleep(DEFAULT_CYCLE_DELAY).await;
        }
    }

    async fn run_cycle(&self) -> Result<(), AutomationError> {
        let due_channels = self.store.get_due_channels().await.map_err(AutomationError::Store)?;

        if due_channels.is_empty() {
            sleep(IDLE_POLL_DELAY).await;
            return Ok(());
        }

        for channel in &due_channels {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            self.orchestrator.update_status(format!("scanning {}", channel.name)).await;
            self.scan_channel(channel).await;
            // Exactly one touch per due channel per cycle, regardless of
            // whether new posts were found (spec.md §8 property 2).
            if let Err(e) = self.store.touch_channel_last_checked(channel.id).await {
                tracing::error!(channel_id = channel.id, error = %e, "failed to touch last_checked");
            }
            sleep(BETWEEN_CHANNEL_DELAY).await;
        }

        self.enqueue_ready_downloads().await;
        Ok(())
    }

    async fn scan_channel(&self, channel: &Channel) {
        let scanner = ChannelScanner::new(&self.fetcher, &self.post_path_marker);
        let candidates = match scanner.scan(&channel.url, false).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(channel = %channel.name, error = %e, "channel scan failed");
                return;
            }
        };

        for candidate in candidates.into_iter().take(MONITORING_CAP) {
            self.ingest_candidate(candidate).await;
        }
    }

    async fn ingest_candidate(&self, candidate: PostCandidate) {
        let exists = match self.store.post_exists(&candidate.url).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::error!(url = %candidate.url, error = %e, "post_exists check failed");
                return;
            }
        };
        if exists {
            return;
        }

        if let Err(e) = self.store.upsert_posts(std::slice::from_ref(&candidate)).await {
            tracing::error!(url = %candidate.url, error = %e, "failed to persist new candidate");
            return;
        }

        match self.fetcher.resolve_media_url(&candidate.url, &candidate.post_id, 2).await {
            Ok(Some(media_url)) => {
                if let Err(e) = self.store.update_media_url(&candidate.url, &media_url).await {
                    tracing::error!(url = %candidate.url, error = %e, "failed to persist resolved media url");
                }
            }
            Ok(None) => tracing::debug!(url = %candidate.url, "no media url resolved yet"),
            Err(e) => tracing::warn!(url = %candidate.url, error = %e, "resolve_media_url failed during ingest"),
        }
    }

    async fn enqueue_ready_downloads(&self) {
        match self.store.get_undownloaded_posts().await {
            Ok(posts) if !posts.is_empty() => {
                self.orchestrator.enqueue(posts).await;
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "failed to list undownloaded posts for enqueue"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_due_channels_includes_never_checked() {
        let db = crate::db::Database::new_in_memory().await.expect("open db");
        let store = Store::new(db.pool().clone());
        store.save_channel("alpha", "https://example/ch/alpha.html", 60).await.expect("save channel");
        let due = store.get_due_channels().await.expect("due channels");
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn get_due_channels_excludes_recently_checked() {
        let db = crate::db::Database::new_in_memory().await.expect("open db");
        let store = Store::new(db.pool().clone());
        let id = store.save_channel("alpha", "https://example/ch/alpha.html", 60).await.expect("save channel");
        store.touch_channel_last_checked(id).await.expect("touch");
        let due = store.get_due_channels().await.expect("due channels");
        assert!(due.is_empty());
    }
}
