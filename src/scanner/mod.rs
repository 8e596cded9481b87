//! Channel Scanner (C4): paginated listing walk and post-node
//! extraction, per spec.md §4.4.
//!
//! The "try each DOM-shape heuristic in priority order, first that
//! yields ≥1 node wins" resolution loop is grounded on the teacher's
//! `downloader-core/src/resolver/registry.rs` `resolve_to_url` pattern,
//! generalized from resolver handlers to DOM-shape heuristics.

use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tokio::time::{Duration, sleep};
use url::Url;

use crate::fetch::{FetchError, PageFetcher};
use crate::model::PostCandidate;

const PAGE_SIZE: u32 = 30;
const MONITORING_PAGE_CAP: u32 = 10;
const BETWEEN_PAGE_DELAY: Duration = Duration::from_millis(1750);
const BETWEEN_POST_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] FetchError),
    #[error("failed to parse channel url: {0}")]
    InvalidUrl(#[source] url::ParseError),
}

/// A DOM-shape heuristic: given a parsed document, returns the nodes it
/// considers post entries, or an empty vec if this shape doesn't match.
type ShapeHeuristic = fn(&Html) -> Vec<(String, String)>;

fn shape_article_with_anchor(doc: &Html) -> Vec<(String, String)> {
    extract_with_selectors(doc, "article a[href][title]", true)
}

fn shape_list_item_with_anchor(doc: &Html) -> Vec<(String, String)> {
    extract_with_selectors(doc, "li.post a[href]", false)
}

fn shape_generic_card_anchor(doc: &Html) -> Vec<(String, String)> {
    extract_with_selectors(doc, "div.card a[href]", false)
}

fn extract_with_selectors(doc: &Html, selector_str: &str, prefer_title_attr: bool) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse(selector_str) else {
        return Vec::new();
    };
    doc.select(&selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?.to_string();
            let title = if prefer_title_attr {
                el.value().attr("title").map(str::to_string).unwrap_or_else(|| el.text().collect::<String>().trim().to_string())
            } else {
                el.text().collect::<String>().trim().to_string()
            };
            Some((title, href))
        })
        .collect()
}

const SHAPES: &[ShapeHeuristic] = &[shape_article_with_anchor, shape_list_item_with_anchor, shape_generic_card_anchor];

pub struct ChannelScanner<'a> {
    fetcher: &'a PageFetcher,
    post_path_marker: &'a str,
}

impl<'a> ChannelScanner<'a> {
    pub fn new(fetcher: &'a PageFetcher, post_path_marker: &'a str) -> Self {
        Self { fetcher, post_path_marker }
    }

    /// Walks pages 1..=min(total_pages, page_cap) and returns discovered
    /// candidates, deterministically in page/DOM order. `full_scan`
    /// controls the page cap (10 for monitoring, unbounded for full
    /// scans) and whether the between-post delay is applied.
    pub async fn scan(&self, channel_url: &str, full_scan: bool) -> Result<Vec<PostCandidate>, ScanError> {
        let first_page_html = self.fetcher.fetch_html(channel_url, 2).await.map_err(ScanError::Fetch)?;
        let total_pages = estimate_total_pages(&first_page_html);
        let page_cap = if full_scan { total_pages } else { total_pages.min(MONITORING_PAGE_CAP) };

        let mut candidates = Vec::new();
        for page in 1..=page_cap {
            let html = if page == 1 {
                first_page_html.clone()
            } else {
                sleep(BETWEEN_PAGE_DELAY).await;
                let page_url = paginate(channel_url, page);
                self.fetcher.fetch_html(&page_url, 2).await.map_err(ScanError::Fetch)?
            };

            let doc = Html::parse_document(&html);
            let nodes = SHAPES.iter().map(|shape| shape(&doc)).find(|nodes| !nodes.is_empty()).unwrap_or_default();

            for (title, href) in nodes {
                if !href.contains(self.post_path_marker) {
                    continue;
                }
                let Some(absolute) = absolutize(channel_url, &href) else { continue };
                let Some(post_id) = extract_post_id(&absolute, self.post_path_marker) else { continue };
                candidates.push(PostCandidate { title, url: absolute, post_id });

                if full_scan {
                    sleep(BETWEEN_POST_DELAY).await;
                }
            }
        }

        Ok(candidates)
    }
}

/// Pagination is derived from the first page: `total_pages ≈ max_offset
/// / 30 + 1`, per spec.md §4.4. The "max offset" is read from a
/// `data-max-offset` attribute on the document if present; absent that
/// signal, a single page is assumed.
fn estimate_total_pages(html: &str) -> u32 {
    let Ok(selector) = Selector::parse("[data-max-offset]") else {
        return 1;
    };
    let doc = Html::parse_document(html);
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("data-max-offset"))
        .and_then(|v| v.parse::<u32>().ok())
        .map(|max_offset| max_offset / PAGE_SIZE + 1)
        .unwrap_or(1)
}

fn paginate(channel_url: &str, page: u32) -> String {
    let offset = (page - 1) * PAGE_SIZE;
    if channel_url.contains('?') {
        format!("{channel_url}&offset={offset}")
    } else {
        format!("{channel_url}?offset={offset}")
    }
}

fn absolutize(base: &str, href: &str) -> Option<String> {
    let base_url = Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

fn extract_post_id(absolute_url: &str, post_path_marker: &str) -> Option<String> {
    let pattern = format!(r"{}/([^/?#]+)", regex::escape(post_path_marker));
    let re = Regex::new(&pattern).ok()?;
    re.captures(absolute_url)?.get(1).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_shape_extracts_title_and_href() {
        let html = r#"<html><body><article><a href="/post/X1" title="A">link text</a></article></body></html>"#;
        let doc = Html::parse_document(html);
        let nodes = shape_article_with_anchor(&doc);
        assert_eq!(nodes, vec![("A".to_string(), "/post/X1".to_string())]);
    }

    #[test]
    fn falls_back_to_second_shape_when_first_yields_nothing() {
        let html = r#"<html><body><li class="post"><a href="/post/X1">A</a></li></body></html>"#;
        let doc = Html::parse_document(html);
        assert!(shape_article_with_anchor(&doc).is_empty());
        let nodes = shape_list_item_with_anchor(&doc);
        assert_eq!(nodes, vec![("A".to_string(), "/post/X1".to_string())]);
    }

    #[test]
    fn extract_post_id_captures_segment_after_marker() {
        let id = extract_post_id("https://example/post/X1", "/post");
        assert_eq!(id, Some("X1".to_string()));
    }

    #[test]
    fn absolutize_resolves_relative_href() {
        let abs = absolutize("https://example/ch/alpha.html", "/post/X1").expect("absolutize");
        assert_eq!(abs, "https://example/post/X1");
    }

    #[test]
    fn estimate_total_pages_defaults_to_one_without_signal() {
        let html = "<html><body>no signal here</body></html>";
        assert_eq!(estimate_total_pages(html), 1);
    }

    #[test]
    fn estimate_total_pages_reads_data_attribute() {
        let html = r#"<html><body><div data-max-offset="90"></div></body></html>"#;
        assert_eq!(estimate_total_pages(html), 4);
    }
}
