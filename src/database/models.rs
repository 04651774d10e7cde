use serde::{Deserialize, Serialize};

/// Placeholder for optional metadata that has not been resolved yet
/// (guest name, shownotes URL, audio URL).
pub const UNKNOWN: &str = "unknown";

/// Categories with dedicated handling. Anything else is a free-form
/// bracketed tag lifted from the episode title.
pub const CATEGORY_INTRO: &str = "INTRO";
pub const CATEGORY_QA: &str = "Q&A";
pub const CATEGORY_INTERVISTA: &str = "INTERVISTA";

/// A dated podcast release. An episode number may be split into multiple
/// parts; `(episode_id, part)` is the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub episode_id: i64,
    pub part: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub guest: String,
    pub audio_url: String,
    pub shownotes_url: String,
}

impl Episode {
    /// True when enrichment left at least one field at the sentinel.
    pub fn has_unknown_metadata(&self) -> bool {
        self.guest == UNKNOWN || self.shownotes_url == UNKNOWN
    }
}

/// A short bonus clip, loosely linked to a full episode. Identified by
/// title; the linked episode id is parsed from free text and may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pill {
    pub episode_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub audio_url: String,
}

/// Result of an insert guarded by a uniqueness constraint. `Duplicate` is
/// a no-op, not an error, so ingestion stays idempotent under retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCount {
    pub label: String,
    pub count: i64,
}

/// Roll-up for the admin/stats surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_episodes: i64,
    pub total_pills: i64,
    pub total_categories: i64,
    pub total_guests: i64,
    pub active_subscribers: i64,
    pub total_queries: i64,
    pub top_queries: Vec<QueryCount>,
}
