//! Guest and shownotes lookup from the companion website.
//!
//! The website publishes one block per episode, newest first, carrying the
//! episode number, the guest name and a link to the shownotes page. The
//! lookup is best-effort by contract: any shape problem degrades the
//! affected field to the `unknown` sentinel instead of failing ingestion.

use crate::database::UNKNOWN;
use crate::error::CoreError;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

/// Metadata resolved for one episode id. Fields hold the sentinel when the
/// lookup could not produce a trustworthy value.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeMetadata {
    pub shownotes_url: String,
    pub guest: String,
}

impl EpisodeMetadata {
    pub fn unknown() -> Self {
        Self {
            shownotes_url: UNKNOWN.to_string(),
            guest: UNKNOWN.to_string(),
        }
    }

    /// True when at least one field fell back to the sentinel.
    pub fn is_degraded(&self) -> bool {
        self.shownotes_url == UNKNOWN || self.guest == UNKNOWN
    }

    /// Shape-check collaborator output before it reaches the store: a blank
    /// guest or a link that is not http(s) degrades to the sentinel. The
    /// pipeline applies this to every lookup result, trusted or not.
    pub fn sanitize(self) -> Self {
        let guest = match self.guest.trim() {
            "" => UNKNOWN.to_string(),
            g => g.to_string(),
        };
        let shownotes_url = if self.shownotes_url.starts_with("http") {
            self.shownotes_url
        } else {
            UNKNOWN.to_string()
        };
        Self {
            shownotes_url,
            guest,
        }
    }
}

/// External metadata source keyed by episode id.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(&self, episode_id: i64) -> Result<EpisodeMetadata, CoreError>;
}

pub struct GuestPageClient {
    client: reqwest::Client,
    page_url: String,
}

impl GuestPageClient {
    pub fn new(page_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            page_url: page_url.to_string(),
        }
    }
}

#[async_trait]
impl MetadataLookup for GuestPageClient {
    async fn lookup(&self, episode_id: i64) -> Result<EpisodeMetadata, CoreError> {
        let response = self
            .client
            .get(&self.page_url)
            .send()
            .await
            .map_err(|e| CoreError::Enrichment(format!("guest page unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(CoreError::Enrichment(format!(
                "guest page returned status {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| CoreError::Enrichment(format!("failed to read guest page: {}", e)))?;

        let entries = parse_guest_page(&html);
        Ok(select_metadata(&entries, episode_id))
    }
}

/// One episode block scraped from the guest page.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestPageEntry {
    pub episode_id: i64,
    pub shownotes_url: Option<String>,
    pub guest: Option<String>,
}

/// Extract the per-episode blocks from the page markup. Blocks are the
/// `container-overlay` sections; within one, the first span names the
/// episode ("Episodio 123"), the second span names the guest, and the
/// anchor links to the shownotes.
pub fn parse_guest_page(html: &str) -> Vec<GuestPageEntry> {
    let id_re = Regex::new(r"Episodio\s+(\d+)").expect("valid id pattern");
    let href_re = Regex::new(r#"href\s*=\s*"([^"]+)""#).expect("valid href pattern");
    let span_re = Regex::new(r"<span[^>]*>([^<]*)</span>").expect("valid span pattern");

    html.split("container-overlay")
        .skip(1)
        .filter_map(|block| {
            let episode_id: i64 = id_re
                .captures(block)?
                .get(1)?
                .as_str()
                .parse()
                .ok()?;

            let shownotes_url = href_re
                .captures(block)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());

            let guest = span_re
                .captures_iter(block)
                .nth(1)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string());

            Some(GuestPageEntry {
                episode_id,
                shownotes_url,
                guest,
            })
        })
        .collect()
}

/// Pick and validate the metadata for one episode id.
///
/// The page lists newest episodes first, so an id greater than the first
/// block's id simply has not been published there yet. Values that fail the
/// shape check (empty guest, non-http link) degrade to the sentinel;
/// the collaborator's output is untrusted by contract.
pub fn select_metadata(entries: &[GuestPageEntry], episode_id: i64) -> EpisodeMetadata {
    let Some(latest) = entries.first() else {
        log::warn!("Guest page has no episode blocks");
        return EpisodeMetadata::unknown();
    };

    if episode_id > latest.episode_id {
        log::info!(
            "Episode {} not yet listed on the guest page (latest is {})",
            episode_id,
            latest.episode_id
        );
        return EpisodeMetadata::unknown();
    }

    let Some(entry) = entries.iter().find(|e| e.episode_id == episode_id) else {
        log::warn!("Episode {} not found on the guest page", episode_id);
        return EpisodeMetadata::unknown();
    };

    let shownotes_url = entry
        .shownotes_url
        .as_deref()
        .filter(|url| url.starts_with("http"))
        .unwrap_or(UNKNOWN)
        .to_string();

    let guest = entry
        .guest
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();

    EpisodeMetadata {
        shownotes_url,
        guest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="container-overlay">
            <a href="https://example.com/ospite/luigi-verdi">
                <span class="ep">Episodio 43</span>
                <span class="name">Luigi Verdi</span>
            </a>
        </div>
        <div class="container-overlay">
            <a href="https://example.com/ospite/mario-rossi">
                <span class="ep">Episodio 42</span>
                <span class="name">Mario Rossi</span>
            </a>
        </div>
    "#;

    #[test]
    fn test_parse_guest_page_blocks() {
        let entries = parse_guest_page(PAGE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].episode_id, 43);
        assert_eq!(entries[1].episode_id, 42);
        assert_eq!(entries[1].guest.as_deref(), Some("Mario Rossi"));
        assert_eq!(
            entries[1].shownotes_url.as_deref(),
            Some("https://example.com/ospite/mario-rossi")
        );
    }

    #[test]
    fn test_parse_guest_page_empty() {
        assert!(parse_guest_page("<html><body>nothing here</body></html>").is_empty());
    }

    #[test]
    fn test_select_metadata_found() {
        let entries = parse_guest_page(PAGE);
        let meta = select_metadata(&entries, 42);
        assert_eq!(meta.guest, "Mario Rossi");
        assert_eq!(meta.shownotes_url, "https://example.com/ospite/mario-rossi");
        assert!(!meta.is_degraded());
    }

    #[test]
    fn test_select_metadata_not_yet_published() {
        let entries = parse_guest_page(PAGE);
        let meta = select_metadata(&entries, 44);
        assert!(meta.is_degraded());
        assert_eq!(meta, EpisodeMetadata::unknown());
    }

    #[test]
    fn test_select_metadata_missing_episode() {
        let entries = parse_guest_page(PAGE);
        // Within the published range but absent from the page
        assert_eq!(select_metadata(&entries, 10), EpisodeMetadata::unknown());
    }

    #[test]
    fn test_select_metadata_validates_shape() {
        let entries = vec![GuestPageEntry {
            episode_id: 42,
            shownotes_url: Some("javascript:void(0)".to_string()),
            guest: Some("   ".to_string()),
        }];
        let meta = select_metadata(&entries, 42);
        assert_eq!(meta, EpisodeMetadata::unknown());
    }

    #[test]
    fn test_select_metadata_empty_page() {
        assert_eq!(select_metadata(&[], 1), EpisodeMetadata::unknown());
    }
}
