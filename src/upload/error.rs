//! `UploadError`, following the same named-constructor convention as
//! `crate::download::error::DownloadError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("media file missing for post_id {post_id}")]
    FileMissing { post_id: String },

    #[error("probe failed for {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("thumbnail generation failed: {0}")]
    ThumbnailFailed(String),

    #[error("read failed for {path} after {attempts} attempts: {source}")]
    ReadFailed {
        path: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("delivery endpoint returned status {status}")]
    DeliveryStatus { status: u16 },

    #[error("delivery request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("delivery response did not contain a parseable message_id")]
    MessageIdMissing,
}

impl UploadError {
    pub fn file_missing(post_id: impl Into<String>) -> Self {
        Self::FileMissing { post_id: post_id.into() }
    }

    pub fn probe_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProbeFailed { path: path.into(), reason: reason.into() }
    }

    pub fn read_failed(path: impl Into<String>, attempts: u32, source: std::io::Error) -> Self {
        Self::ReadFailed { path: path.into(), attempts, source }
    }

    pub fn delivery_status(status: u16) -> Self {
        Self::DeliveryStatus { status }
    }
}
