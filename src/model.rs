//! Core persisted entities: [`Channel`] and [`Post`].
//!
//! Timestamps are stored and passed around as `String` (SQLite
//! `datetime('now')` text), not a `chrono` type, matching the
//! convention used throughout this store's schema.

use serde::{Deserialize, Serialize};

/// A scan target on the protected host.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub check_interval_min: i64,
    pub is_active: bool,
    pub last_checked: Option<String>,
    pub created_at: String,
}

/// A discovered media page and its pipeline state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub post_id: String,
    pub media_source_url: Option<String>,
    pub downloaded: bool,
    pub download_path: Option<String>,
    pub downloaded_at: Option<String>,
    pub uploaded: bool,
    pub upload_message_id: Option<String>,
    pub last_upload_attempt_at: Option<String>,
    pub discovered_at: String,
}

/// A bare candidate yielded by the channel scanner, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCandidate {
    pub title: String,
    pub url: String,
    pub post_id: String,
}
