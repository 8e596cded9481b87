//! `get_media_url`: the compound operation described in spec.md §4.2(b-c).
//!
//! Acquires cookies/UA via `get_page`, drives a headless browser directly
//! (via `chromiumoxide`) to capture the first outbound network request
//! matching the post, then follows redirects with a HEAD request to
//! surface the final CDN URL. Grounded on the headless-browser crate
//! choice observed in the pack's `cyrup-ai-kodegen-tools-citescrape`
//! Cargo.toml; the event-driven first-match-wins capture follows the
//! contract in spec.md §9 ("Event-driven network capture").

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::{Browser, BrowserConfig};
use futures_util::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::time::timeout;

use super::{SolverClient, SolverError};

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(15);
const MEDIA_EXTENSION: &str = ".vid";
const KNOWN_CDN_HOST_MARKER: &str = "cdn";

#[derive(Debug, Error)]
pub enum MediaUrlError {
    #[error("solver error while preparing browser session: {0}")]
    Solver(#[source] SolverError),
    #[error("failed to launch headless browser: {0}")]
    BrowserLaunch(String),
    #[error("browser navigation failed: {0}")]
    Navigation(String),
}

/// Captures the first network request matching the post, or `None` if
/// nothing matching is seen before the 15 s timeout.
pub async fn get_media_url(
    solver: &mut SolverClient,
    post_url: &str,
    post_id: &str,
) -> Result<Option<String>, MediaUrlError> {
    let (_, cookies, user_agent) = solver.get_page(post_url).await.map_err(MediaUrlError::Solver)?;

    let config = BrowserConfig::builder()
        .arg(format!("--user-agent={user_agent}"))
        .build()
        .map_err(MediaUrlError::BrowserLaunch)?;

    let (mut browser, mut handler) =
        Browser::launch(config).await.map_err(|e| MediaUrlError::BrowserLaunch(e.to_string()))?;

    let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

    let result = capture_matching_request(&mut browser, post_url, post_id, &cookies).await;

    let _ = browser.close().await;
    handler_task.abort();

    let captured = result?;
    match captured {
        Some(raw_url) => Ok(Some(follow_redirect(&raw_url).await.unwrap_or(raw_url))),
        None => Ok(None),
    }
}

async fn capture_matching_request(
    browser: &mut Browser,
    post_url: &str,
    post_id: &str,
    cookies: &[super::SolverCookie],
) -> Result<Option<String>, MediaUrlError> {
    let page = browser.new_page("about:blank").await.map_err(|e| MediaUrlError::Navigation(e.to_string()))?;

    for cookie in cookies {
        let _ = page
            .execute(chromiumoxide::cdp::browser_protocol::network::SetCookieParams::new(
                cookie.name.clone(),
                cookie.value.clone(),
            ))
            .await;
    }

    let mut events = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| MediaUrlError::Navigation(e.to_string()))?;

    page.goto(post_url).await.map_err(|e| MediaUrlError::Navigation(e.to_string()))?;

    let post_id = post_id.to_string();
    let capture = async {
        while let Some(event) = events.next().await {
            let url = &event.request.url;
            if matches_media_request(url, &post_id) {
                return Some(url.clone());
            }
        }
        None
    };

    Ok(timeout(CAPTURE_TIMEOUT, capture).await.unwrap_or(None))
}

fn matches_media_request(url: &str, post_id: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let contains_post_id_and_extension = lower.contains(&post_id.to_ascii_lowercase()) && lower.ends_with(MEDIA_EXTENSION);
    let known_cdn_host = url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_ascii_lowercase()))
        .is_some_and(|host| host.contains(KNOWN_CDN_HOST_MARKER));
    contains_post_id_and_extension || known_cdn_host
}

/// Follows HTTP redirects on `raw_url` via a HEAD request to surface the
/// final CDN URL. Returns `None` on any failure; the caller falls back
/// to the pre-redirect URL per spec.md §4.2(c).
async fn follow_redirect(raw_url: &str) -> Option<String> {
    let client = Client::builder().build().ok()?;
    let response = client.head(raw_url).send().await.ok()?;
    Some(response.url().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_post_id_and_media_extension() {
        assert!(matches_media_request("https://host/media/ABC123.vid", "ABC123"));
        assert!(!matches_media_request("https://host/media/OTHER.vid", "ABC123"));
    }

    #[test]
    fn matches_known_cdn_host_regardless_of_post_id() {
        assert!(matches_media_request("https://edge.cdn.example/blob/xyz", "ABC123"));
    }

    #[test]
    fn does_not_match_unrelated_asset() {
        assert!(!matches_media_request("https://host/static/app.js", "ABC123"));
    }
}
