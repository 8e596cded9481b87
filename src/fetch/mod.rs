//! Page Fetcher (C3): retry-wrapped operations over the session manager
//! and solver client, per spec.md §4.3.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::{Duration, sleep};

use crate::session::{SessionError, SessionManager};
use crate::solver::media_url::{MediaUrlError, get_media_url};
use crate::solver::SolverError;

const RETRY_SLEEP: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("session acquisition failed: {0}")]
    Session(#[source] SessionError),
    #[error("solver request failed after retries: {0}")]
    Solver(#[source] SolverError),
    #[error("media url resolution failed after retries: {0}")]
    MediaUrl(#[source] MediaUrlError),
}

pub struct PageFetcher {
    sessions: Arc<SessionManager>,
}

impl PageFetcher {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Fetches solved HTML for `url`, renewing the session and retrying
    /// up to `max_retries` times on failure.
    pub async fn fetch_html(&self, url: &str, max_retries: u32) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let mut client = self.sessions.acquire().await.map_err(FetchError::Session)?;
            match client.get_page(url).await {
                Ok((html, _cookies, _ua)) => return Ok(html),
                Err(err) if attempt < max_retries => {
                    attempt += 1;
                    let _ = self.sessions.renew().await;
                    sleep(RETRY_SLEEP).await;
                    tracing::warn!(url, attempt, error = %err, "fetch_html retrying after failure");
                }
                Err(err) => return Err(FetchError::Solver(err)),
            }
        }
    }

    /// Resolves the media URL for `post_url`, retrying the same number
    /// of times. Returns `Ok(None)` (not an error) if the solver ran to
    /// completion but no matching network request was observed.
    pub async fn resolve_media_url(
        &self,
        post_url: &str,
        post_id: &str,
        max_retries: u32,
    ) -> Result<Option<String>, FetchError> {
        let mut attempt = 0;
        loop {
            let mut client = self.sessions.acquire().await.map_err(FetchError::Session)?;
            match get_media_url(&mut client, post_url, post_id).await {
                Ok(maybe_url) => return Ok(maybe_url),
                Err(err) if attempt < max_retries => {
                    attempt += 1;
                    let _ = self.sessions.renew().await;
                    sleep(RETRY_SLEEP).await;
                    tracing::warn!(post_url, attempt, error = %err, "resolve_media_url retrying after failure");
                }
                Err(err) => return Err(FetchError::MediaUrl(err)),
            }
        }
    }
}
