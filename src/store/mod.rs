//! Persistence operations over [`crate::model::Channel`] and
//! [`crate::model::Post`]. One free function per operation listed in
//! `spec.md` §6, grounded on the query style of the teacher's
//! `src/queue/mod.rs` (`UPDATE ... RETURNING`, `check_affected`, explicit
//! per-operation errors rather than one catch-all DB error).

use sqlx::SqlitePool;
use thiserror::Error;

use crate::model::{Channel, Post, PostCandidate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("post not found for url {0}")]
    PostNotFound(String),
    #[error("channel not found for id {0}")]
    ChannelNotFound(i64),
}

fn check_affected(rows_affected: u64, not_found: StoreError) -> Result<(), StoreError> {
    if rows_affected == 0 { Err(not_found) } else { Ok(()) }
}

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts new candidates, or refreshes `title`/`discovered_at` on
    /// conflict by `url`. `media_source_url` is left untouched here; it is
    /// filled separately via [`Store::update_media_url`] once resolved.
    pub async fn upsert_posts(&self, candidates: &[PostCandidate]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Query)?;
        for c in candidates {
            sqlx::query(
                "INSERT INTO posts (url, title, post_id, discovered_at)
                 VALUES (?1, ?2, ?3, datetime('now'))
                 ON CONFLICT(url) DO UPDATE SET title = excluded.title",
            )
            .bind(&c.url)
            .bind(&c.title)
            .bind(&c.post_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Query)?;
        }
        tx.commit().await.map_err(StoreError::Query)?;
        Ok(())
    }

    pub async fn get_all_posts(&self) -> Result<Vec<Post>, StoreError> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts ORDER BY discovered_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)
    }

    pub async fn get_undownloaded_posts(&self) -> Result<Vec<Post>, StoreError> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts
             WHERE downloaded = 0 AND media_source_url IS NOT NULL
             ORDER BY discovered_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    pub async fn get_downloaded_not_uploaded_posts(&self) -> Result<Vec<Post>, StoreError> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts
             WHERE downloaded = 1 AND uploaded = 0 AND download_path IS NOT NULL
             ORDER BY downloaded_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    pub async fn get_posts_missing_media_url(&self, limit: i64) -> Result<Vec<Post>, StoreError> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE media_source_url IS NULL ORDER BY discovered_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    pub async fn post_exists(&self, url: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM posts WHERE url = ?1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(row.is_some())
    }

    pub async fn update_media_url(&self, url: &str, new_url: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE posts SET media_source_url = ?1 WHERE url = ?2")
            .bind(new_url)
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        check_affected(result.rows_affected(), StoreError::PostNotFound(url.to_string()))
    }

    pub async fn mark_downloaded(&self, url: &str, path: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE posts SET downloaded = 1, download_path = ?1, downloaded_at = datetime('now')
             WHERE url = ?2",
        )
        .bind(path)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        check_affected(result.rows_affected(), StoreError::PostNotFound(url.to_string()))
    }

    pub async fn mark_uploaded(&self, url: &str, message_id: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE posts SET uploaded = 1, upload_message_id = ?1 WHERE url = ?2")
            .bind(message_id)
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        check_affected(result.rows_affected(), StoreError::PostNotFound(url.to_string()))
    }

    pub async fn touch_upload_attempt(&self, url: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE posts SET last_upload_attempt_at = datetime('now') WHERE url = ?1")
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        check_affected(result.rows_affected(), StoreError::PostNotFound(url.to_string()))
    }

    pub async fn get_active_channels(&self) -> Result<Vec<Channel>, StoreError> {
        sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE is_active = 1 ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)
    }

    /// Active channels whose `check_interval_min` has elapsed since
    /// `last_checked` (or that have never been checked). The interval
    /// arithmetic happens in SQL against `datetime('now')` rather than
    /// parsing the stored text timestamp in Rust.
    pub async fn get_due_channels(&self) -> Result<Vec<Channel>, StoreError> {
        sqlx::query_as::<_, Channel>(
            "SELECT * FROM channels
             WHERE is_active = 1
               AND (
                 last_checked IS NULL
                 OR (julianday('now') - julianday(last_checked)) * 1440 >= check_interval_min
               )
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    pub async fn save_channel(&self, name: &str, url: &str, check_interval_minutes: i64) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO channels (name, url, check_interval_min) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET name = excluded.name",
        )
        .bind(name)
        .bind(url)
        .bind(check_interval_minutes)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn touch_channel_last_checked(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE channels SET last_checked = datetime('now') WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        check_affected(result.rows_affected(), StoreError::ChannelNotFound(id))
    }

    pub async fn count_undownloaded(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM posts WHERE downloaded = 0 AND media_source_url IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(count)
    }

    pub async fn count_pending_uploads(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM posts WHERE downloaded = 1 AND uploaded = 0")
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::Query)?;
        Ok(count)
    }

    pub async fn count_downloads(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE downloaded = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(count)
    }

    pub async fn count_uploads(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE uploaded = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn store() -> Store {
        let db = Database::new_in_memory().await.expect("open db");
        Store::new(db.pool().clone())
    }

    #[tokio::test]
    async fn upsert_then_exists() {
        let store = store().await;
        let candidates = vec![PostCandidate {
            title: "A".to_string(),
            url: "https://example/post/X1".to_string(),
            post_id: "X1".to_string(),
        }];
        store.upsert_posts(&candidates).await.expect("upsert");
        assert!(store.post_exists("https://example/post/X1").await.expect("exists"));
        assert!(!store.post_exists("https://example/post/none").await.expect("exists"));
    }

    #[tokio::test]
    async fn mark_downloaded_then_uploaded_round_trip() {
        let store = store().await;
        let candidates = vec![PostCandidate {
            title: "A".to_string(),
            url: "https://example/post/X1".to_string(),
            post_id: "X1".to_string(),
        }];
        store.upsert_posts(&candidates).await.expect("upsert");
        store.update_media_url("https://example/post/X1", "https://cdn/X1.vid").await.expect("update url");
        store.mark_downloaded("https://example/post/X1", "/tmp/A_X1.mp4").await.expect("mark downloaded");

        let undownloaded = store.get_undownloaded_posts().await.expect("list");
        assert!(undownloaded.is_empty());

        let pending_upload = store.get_downloaded_not_uploaded_posts().await.expect("list");
        assert_eq!(pending_upload.len(), 1);

        store.mark_uploaded("https://example/post/X1", Some("999")).await.expect("mark uploaded");
        let pending_upload = store.get_downloaded_not_uploaded_posts().await.expect("list");
        assert!(pending_upload.is_empty());
    }

    #[tokio::test]
    async fn mark_downloaded_missing_post_errors() {
        let store = store().await;
        let err = store.mark_downloaded("https://example/post/missing", "/tmp/x").await.unwrap_err();
        assert!(matches!(err, StoreError::PostNotFound(_)));
    }

    #[tokio::test]
    async fn touch_channel_last_checked() {
        let store = store().await;
        let id = store.save_channel("alpha", "https://example/ch/alpha.html", 60).await.expect("save channel");
        store.touch_channel_last_checked(id).await.expect("touch");
        let channels = store.get_active_channels().await.expect("list channels");
        assert_eq!(channels.len(), 1);
        assert!(channels[0].last_checked.is_some());
    }
}
