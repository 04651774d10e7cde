//! Upstream podcast feed collaborator.
//!
//! The pipeline only ever needs the single most recent item of a feed; the
//! RSS client fetches and parses with bounded timeouts, and the pure helpers
//! below hold the title conventions shared by episodes and pills.

use crate::database::{CATEGORY_INTERVISTA, CATEGORY_INTRO, CATEGORY_QA};
use crate::error::CoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::time::Duration;

/// One feed entry, reduced to what ingestion needs.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub external_url: String,
    pub release_date: Option<DateTime<Utc>>,
}

/// Source of feed items. The real implementation talks RSS over HTTP; tests
/// substitute canned items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Most recent item of the given feed, or None when the feed is empty.
    async fn fetch_latest(&self, feed_url: &str) -> Result<Option<FeedItem>, CoreError>;
}

pub struct RssFeedClient {
    client: reqwest::Client,
}

impl RssFeedClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl FeedSource for RssFeedClient {
    async fn fetch_latest(&self, feed_url: &str) -> Result<Option<FeedItem>, CoreError> {
        let response = self
            .client
            .get(feed_url)
            .send()
            .await
            .map_err(|e| CoreError::Feed(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CoreError::Feed(format!(
                "feed returned status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Feed(format!("failed to read feed body: {}", e)))?;

        let feed = feed_rs::parser::parse(body.as_bytes())
            .map_err(|e| CoreError::Feed(format!("failed to parse feed: {}", e)))?;

        log::debug!("Parsed {} entries from {}", feed.entries.len(), feed_url);

        // RSS feeds are newest-first by convention, but don't trust it:
        // the latest publish date wins, with feed order breaking date ties.
        let latest = feed
            .entries
            .into_iter()
            .enumerate()
            .max_by_key(|(idx, entry)| {
                (entry.published.or(entry.updated), std::cmp::Reverse(*idx))
            })
            .map(|(_, entry)| entry);

        Ok(latest.map(|entry| {
            let external_url = entry
                .media
                .first()
                .and_then(|m| m.content.first())
                .and_then(|c| c.url.as_ref())
                .map(|u| u.to_string())
                .or_else(|| {
                    entry
                        .links
                        .iter()
                        .find(|l| l.media_type.as_deref() == Some("audio/mpeg"))
                        .map(|l| l.href.clone())
                })
                .or_else(|| entry.links.first().map(|l| l.href.clone()))
                .unwrap_or_default();

            FeedItem {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                description: entry.summary.map(|s| s.content).unwrap_or_default(),
                external_url,
                release_date: entry.published,
            }
        }))
    }
}

// ============================================================================
// Title conventions
// ============================================================================

/// Strip the show prefix some feeds prepend to every title
/// (e.g. "Office of Cards - 123_2 Titolo" -> "123_2 Titolo").
pub fn strip_title_prefix<'a>(title: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return title.trim();
    }
    title.trim().strip_prefix(prefix).unwrap_or(title).trim()
}

/// Parse the numbering convention `"<id>[_<part>] <free text>"`.
///
/// Returns None when the leading token is absent or malformed; such items
/// are not ingestable as episodes. A missing part defaults to 1.
pub fn parse_title_numbering(title: &str) -> Option<(i64, i64)> {
    let re = Regex::new(r"^(\d+)(?:_(\d+))?\s").expect("valid numbering pattern");
    let caps = re.captures(title.trim())?;

    let episode_id: i64 = caps.get(1)?.as_str().parse().ok()?;
    let part: i64 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };

    if part < 1 {
        return None;
    }
    Some((episode_id, part))
}

/// Derive the category from a title.
///
/// Episode 0 is the show intro and episodes 3 and 31 are historical Q&A
/// releases published before the bracketed-tag convention existed; they
/// stay special-cased. Otherwise the bracketed tag wins and everything
/// else is an interview.
pub fn derive_category(title: &str, episode_id: i64) -> String {
    if episode_id == 0 {
        return CATEGORY_INTRO.to_string();
    }
    if episode_id == 3 || episode_id == 31 {
        return CATEGORY_QA.to_string();
    }

    if let (Some(start), Some(end)) = (title.find('['), title.find(']')) {
        if start < end {
            let tag = title[start + 1..end].trim();
            if !tag.is_empty() {
                return tag.to_string();
            }
        }
    }

    CATEGORY_INTERVISTA.to_string()
}

/// Best-effort link from a pill to its full episode: the first integer
/// token anywhere in the description.
pub fn linked_episode_id(description: &str) -> Option<i64> {
    description
        .split_whitespace()
        .find_map(|word| word.parse::<i64>().ok())
        .filter(|id| *id >= 0)
}
