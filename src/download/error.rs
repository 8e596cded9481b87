//! `DownloadError`, grounded on the teacher's `src/download/error.rs`:
//! named constructor functions per failure context instead of blanket
//! `From<reqwest::Error>`/`From<std::io::Error>` impls, so call sites
//! attach the right context (url, status, attempt) rather than losing
//! it to an opaque conversion.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http status {status} downloading {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("io error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid media url: {0}")]
    InvalidUrl(String),

    #[error("size mismatch for {path}: expected {expected_bytes}, got {actual_bytes}")]
    Integrity { path: String, expected_bytes: u64, actual_bytes: u64 },

    #[error("media url expired for {url}, refresh exhausted after {attempts} attempts")]
    RefreshExhausted { url: String, attempts: u32 },
}

impl DownloadError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network { url: url.into(), source }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus { url: url.into(), status }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl(url.into())
    }

    pub fn integrity(path: impl Into<String>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity { path: path.into(), expected_bytes, actual_bytes }
    }

    pub fn refresh_exhausted(url: impl Into<String>, attempts: u32) -> Self {
        Self::RefreshExhausted { url: url.into(), attempts }
    }
}
