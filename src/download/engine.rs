//! Download Engine (C5), per spec.md §4.5.
//!
//! Grounded on the teacher's `src/download/engine.rs` (semaphore-bounded
//! per-item tasks, `DownloadStats`, progress callback) and
//! `src/download/client.rs` (browser-realistic headers, builder-style
//! `HttpClient`). The queueing/semaphore ownership itself lives in
//! `crate::pipeline`; this module is the single-item download
//! implementation the orchestrator's workers invoke.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;
use super::naming::download_filename;
use super::progress::DownloadProgress;
use super::retry::{FailureType, classify_http_status};

const CHUNK_LOG_INTERVAL: u64 = 1024 * 1024;
const MIN_VALID_FILE_BYTES: u64 = 1024;
const SIZE_TOLERANCE_FRACTION: f64 = 0.01;
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Outcome of a single download attempt, distinguishing the
/// URL-expired case from a terminal failure so the caller (C7's worker)
/// knows whether to ask C3 for a fresh media URL and retry.
pub enum AttemptOutcome {
    Completed { path: PathBuf, bytes: u64 },
    Expired,
    Failed(DownloadError),
}

pub struct DownloadEngine {
    client: Client,
    download_dir: PathBuf,
}

impl DownloadEngine {
    pub fn new(download_dir: PathBuf) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .build()
            .map_err(|e| DownloadError::invalid_url(format!("client build failed: {e}")))?;
        Ok(Self { client, download_dir })
    }

    fn headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ACCEPT, "*/*")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header("Sec-Fetch-Dest", "video")
            .header("Sec-Fetch-Mode", "no-cors")
            .header("Sec-Fetch-Site", "cross-site")
            .header(reqwest::header::CONNECTION, "keep-alive")
    }

    /// Runs the full preexisting-file-validation + stream-download +
    /// atomic-rename sequence for one item, invoking `on_progress` on
    /// every chunk.
    pub async fn download(
        &self,
        title: &str,
        post_id: &str,
        media_url: &str,
        mut on_progress: impl FnMut(&DownloadProgress),
    ) -> AttemptOutcome {
        let filename = download_filename(title, post_id, media_url);
        let final_path = self.download_dir.join(&filename);

        if final_path.exists() {
            match self.validate_existing(&final_path, media_url).await {
                Ok(true) => {
                    return AttemptOutcome::Completed {
                        bytes: tokio::fs::metadata(&final_path).await.map(|m| m.len()).unwrap_or(0),
                        path: final_path,
                    };
                }
                Ok(false) => {
                    let _ = tokio::fs::remove_file(&final_path).await;
                }
                Err(e) => return AttemptOutcome::Failed(e),
            }
        }

        self.stream_download(&final_path, media_url, post_id, &mut on_progress).await
    }

    async fn validate_existing(&self, path: &Path, media_url: &str) -> Result<bool, DownloadError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| DownloadError::io(path.display().to_string(), e))?;
        if metadata.len() < MIN_VALID_FILE_BYTES {
            return Ok(false);
        }

        if let Ok(response) = self.headers(self.client.head(media_url)).send().await {
            if let Some(expected) = response.headers().get(reqwest::header::CONTENT_LENGTH).and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<u64>().ok()) {
                let diff = metadata.len().abs_diff(expected);
                let tolerance = (expected as f64 * SIZE_TOLERANCE_FRACTION).ceil() as u64;
                return Ok(diff <= tolerance);
            }
        }

        // No content-length signal: fall back to reading the first and
        // last byte to confirm the file is at least readable end to end.
        read_first_and_last_byte(path).await.map_err(|e| DownloadError::io(path.display().to_string(), e))?;
        Ok(true)
    }

    async fn stream_download(
        &self,
        final_path: &Path,
        media_url: &str,
        post_id: &str,
        on_progress: &mut impl FnMut(&DownloadProgress),
    ) -> AttemptOutcome {
        let tmp_path = final_path.with_extension(tmp_extension(final_path));

        let response = match self.headers(self.client.get(media_url)).send().await {
            Ok(resp) => resp,
            Err(e) => return AttemptOutcome::Failed(DownloadError::network(media_url, e)),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return AttemptOutcome::Expired;
        }
        if !status.is_success() {
            if matches!(classify_http_status(status.as_u16()), FailureType::NeedsRefresh) {
                return AttemptOutcome::Expired;
            }
            return AttemptOutcome::Failed(DownloadError::http_status(media_url, status.as_u16()));
        }

        let content_length = response.content_length();
        let mut file = match File::create(&tmp_path).await {
            Ok(f) => f,
            Err(e) => return AttemptOutcome::Failed(DownloadError::io(tmp_path.display().to_string(), e)),
        };

        let mut progress = DownloadProgress::new(0, post_id.to_string());
        progress.bytes_total = content_length;
        let mut bytes_written: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&tmp_path).await;
                    return AttemptOutcome::Failed(DownloadError::network(media_url, e));
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return AttemptOutcome::Failed(DownloadError::io(tmp_path.display().to_string(), e));
            }
            bytes_written += chunk.len() as u64;
            if bytes_written % CHUNK_LOG_INTERVAL < chunk.len() as u64 {
                progress.bytes_read = bytes_written;
                on_progress(&progress);
            }
        }
        progress.bytes_read = bytes_written;
        on_progress(&progress);

        if let Err(e) = file.flush().await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return AttemptOutcome::Failed(DownloadError::io(tmp_path.display().to_string(), e));
        }
        drop(file);

        if let Some(expected) = content_length {
            if expected != bytes_written {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return AttemptOutcome::Failed(DownloadError::integrity(
                    tmp_path.display().to_string(),
                    expected,
                    bytes_written,
                ));
            }
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return AttemptOutcome::Failed(DownloadError::io(final_path.display().to_string(), e));
        }

        AttemptOutcome::Completed { path: final_path.to_path_buf(), bytes: bytes_written }
    }
}

fn tmp_extension(final_path: &Path) -> String {
    match final_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.tmp"),
        None => "tmp".to_string(),
    }
}

async fn read_first_and_last_byte(path: &Path) -> std::io::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncSeekExt};
    let mut file = File::open(path).await?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte).await?;
    let len = file.metadata().await?.len();
    if len > 1 {
        file.seek(std::io::SeekFrom::End(-1)).await?;
        file.read_exact(&mut byte).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_extension_appends_to_existing_extension() {
        assert_eq!(tmp_extension(Path::new("/a/A_X1.mp4")), "mp4.tmp");
    }

    #[test]
    fn tmp_extension_handles_missing_extension() {
        assert_eq!(tmp_extension(Path::new("/a/A_X1")), "tmp");
    }
}
