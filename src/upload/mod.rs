//! Delivery Uploader (C6), per spec.md §4.6.

pub mod caption;
pub mod error;
pub mod probe;
pub mod thumbnail;

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tokio::io::AsyncReadExt;
use tokio::time::sleep;

pub use error::UploadError;

const READ_MAX_ATTEMPTS: u32 = 5;
const READ_BASE_DELAY: Duration = Duration::from_secs(1);

pub struct DeliveryConfig {
    pub token: String,
    pub chat_id: String,
    pub base_url: String,
}

pub struct Uploader {
    client: Client,
    config: DeliveryConfig,
}

pub struct UploadOutcome {
    pub message_id: Option<String>,
}

impl Uploader {
    pub fn new(config: DeliveryConfig) -> Self {
        Self { client: Client::new(), config }
    }

    /// Resolves the final on-disk path, searching `download_dir` by
    /// `post_id` substring match if `download_path` is missing.
    pub async fn resolve_path(download_path: Option<&str>, download_dir: &Path, post_id: &str) -> Option<PathBuf> {
        if let Some(p) = download_path {
            let path = PathBuf::from(p);
            if path.exists() {
                return Some(path);
            }
        }

        let mut entries = tokio::fs::read_dir(download_dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().contains(post_id) {
                return Some(entry.path());
            }
        }
        None
    }

    /// Runs the full probe -> thumbnail -> read -> multipart-upload
    /// sequence for one downloaded post.
    pub async fn upload(&self, title: &str, post_id: &str, path: &Path) -> Result<UploadOutcome, UploadError> {
        let probed = probe::probe(path).await?;

        let thumb_dir = std::env::temp_dir().join("scraper-thumbs");
        tokio::fs::create_dir_all(&thumb_dir)
            .await
            .map_err(|e| UploadError::ThumbnailFailed(format!("failed to create thumb dir: {e}")))?;
        let thumb_path = thumb_dir.join(format!("{post_id}.jpg"));

        let thumbnail_result = thumbnail::generate_thumbnail_grid(path, probed.duration_seconds, &thumb_path).await;
        let cleanup_and_return = |result: Result<UploadOutcome, UploadError>| async {
            let _ = tokio::fs::remove_file(&thumb_path).await;
            result
        };

        if let Err(e) = thumbnail_result {
            return cleanup_and_return(Err(e)).await;
        }

        let media_bytes = match read_with_backoff(path).await {
            Ok(bytes) => bytes,
            Err(e) => return cleanup_and_return(Err(e)).await,
        };
        let thumb_bytes = match read_with_backoff(&thumb_path).await {
            Ok(bytes) => bytes,
            Err(e) => return cleanup_and_return(Err(e)).await,
        };

        let result = self.send(title, post_id, &probed, media_bytes, thumb_bytes).await;
        cleanup_and_return(result).await
    }

    async fn send(
        &self,
        title: &str,
        post_id: &str,
        probed: &probe::ProbeResult,
        media_bytes: Vec<u8>,
        thumb_bytes: Vec<u8>,
    ) -> Result<UploadOutcome, UploadError> {
        let caption = caption::build_caption(title, probed.width, probed.height, probed.duration_seconds, probed.size_bytes);

        let video_filename = format!("{post_id}.mp4");
        let form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("caption", caption)
            .text("parse_mode", "Markdown")
            .text("duration", probed.duration_seconds.to_string())
            .text("width", probed.width.to_string())
            .text("height", probed.height.to_string())
            .text("supports_streaming", "true")
            .part("video", Part::bytes(media_bytes).file_name(video_filename))
            .part("thumb", Part::bytes(thumb_bytes).file_name(format!("{post_id}.jpg")));

        let url = format!("{}/bot{}/sendVideo", self.config.base_url.trim_end_matches('/'), self.config.token);
        let response = self.client.post(&url).multipart(form).send().await.map_err(UploadError::Request)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(UploadError::delivery_status(status.as_u16()));
        }

        Ok(UploadOutcome { message_id: extract_message_id(&body) })
    }
}

/// 5-attempt exponential backoff (start 1s, double each time) reading
/// the whole file into memory, verifying the read length matches the
/// file's reported size, per spec.md §4.6 step 4.
async fn read_with_backoff(path: &Path) -> Result<Vec<u8>, UploadError> {
    let mut attempt = 0;
    loop {
        match try_read(path).await {
            Ok(bytes) => return Ok(bytes),
            Err(_) if attempt + 1 < READ_MAX_ATTEMPTS => {
                attempt += 1;
                sleep(READ_BASE_DELAY * 2u32.pow(attempt - 1)).await;
            }
            Err(e) => return Err(UploadError::read_failed(path.display().to_string(), READ_MAX_ATTEMPTS, e)),
        }
    }
}

async fn try_read(path: &Path) -> std::io::Result<Vec<u8>> {
    let expected_len = tokio::fs::metadata(path).await?.len();
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = Vec::with_capacity(expected_len as usize);
    file.read_to_end(&mut buf).await?;
    if buf.len() as u64 != expected_len {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "read length did not match file size"));
    }
    Ok(buf)
}

/// Parses the numeric `message_id` out of the JSON response body with a
/// simple regex, per spec.md §4.6 step 6. spec.md §9 flags this as an
/// open question (the regex may not handle nested JSON in all cases);
/// this is accepted as-is rather than hand-rolling a JSON-path query
/// for a single scalar field.
fn extract_message_id(body: &str) -> Option<String> {
    let re = Regex::new(r#""message_id"\s*:\s*(\d+)"#).ok()?;
    re.captures(body)?.get(1).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_message_id_finds_top_level_field() {
        let body = r#"{"ok":true,"result":{"message_id":4821,"date":123}}"#;
        assert_eq!(extract_message_id(body), Some("4821".to_string()));
    }

    #[test]
    fn extract_message_id_returns_none_when_absent() {
        let body = r#"{"ok":false,"description":"Bad Request"}"#;
        assert_eq!(extract_message_id(body), None);
    }
}
