pub mod models;

#[cfg(test)]
mod tests;

use anyhow::{bail, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub use models::*;

/// Durable catalog store for episodes, pills, usage stats and subscribers.
///
/// A single connection behind a mutex keeps every logical operation (check +
/// write) atomic with respect to the uniqueness constraints; WAL mode lets
/// readers proceed while the scheduler thread is committing.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=10000;
            PRAGMA temp_store=MEMORY;
        ",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                episode_id INTEGER NOT NULL,
                part INTEGER NOT NULL DEFAULT 1,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                guest TEXT NOT NULL DEFAULT 'unknown',
                audio_url TEXT NOT NULL DEFAULT 'unknown',
                shownotes_url TEXT NOT NULL DEFAULT 'unknown',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(episode_id, part)
            );

            CREATE INDEX IF NOT EXISTS idx_episodes_episode_id
                ON episodes(episode_id);
            CREATE INDEX IF NOT EXISTS idx_episodes_category
                ON episodes(category);
            CREATE INDEX IF NOT EXISTS idx_episodes_guest
                ON episodes(guest);

            CREATE TABLE IF NOT EXISTS pills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                episode_id INTEGER,
                title TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                audio_url TEXT NOT NULL DEFAULT 'unknown',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Append-only audit log of user queries
            CREATE TABLE IF NOT EXISTS stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at TEXT NOT NULL,
                chat_id TEXT NOT NULL,
                query TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_stats_chat_id ON stats(chat_id);

            -- Subscribers are deactivated, never deleted, so stats rows
            -- keep a valid chat_id to correlate against.
            CREATE TABLE IF NOT EXISTS subscribers (
                chat_id TEXT PRIMARY KEY,
                added_at TEXT NOT NULL DEFAULT (datetime('now')),
                active INTEGER NOT NULL DEFAULT 1
            );
        "#,
        )?;

        Ok(())
    }

    // =========================================================================
    // Episode queries
    // =========================================================================

    /// Highest episode id in the catalog, 0 when empty.
    pub fn max_episode_id(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let max: Option<i64> =
            conn.query_row("SELECT MAX(episode_id) FROM episodes", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0))
    }

    /// Episode with the highest id, tie-broken by highest part.
    pub fn last_episode(&self) -> Result<Option<Episode>> {
        let conn = self.conn.lock().unwrap();
        let episode = conn
            .query_row(
                &format!(
                    "{} ORDER BY episode_id DESC, part DESC LIMIT 1",
                    SELECT_EPISODE
                ),
                [],
                map_episode,
            )
            .ok();
        Ok(episode)
    }

    /// All parts of an episode number, ordered by part.
    pub fn episodes_by_id(&self, episode_id: i64) -> Result<Vec<Episode>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE episode_id = ? ORDER BY part ASC",
            SELECT_EPISODE
        ))?;
        let episodes = stmt
            .query_map(params![episode_id], map_episode)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(episodes)
    }

    /// Exact, case-sensitive title match.
    pub fn episode_by_title(&self, title: &str) -> Result<Option<Episode>> {
        let conn = self.conn.lock().unwrap();
        let episode = conn
            .query_row(
                &format!("{} WHERE title = ? LIMIT 1", SELECT_EPISODE),
                params![title],
                map_episode,
            )
            .ok();
        Ok(episode)
    }

    pub fn episodes_by_category(&self, category: &str) -> Result<Vec<Episode>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE category = ? ORDER BY episode_id ASC, part ASC",
            SELECT_EPISODE
        ))?;
        let episodes = stmt
            .query_map(params![category], map_episode)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(episodes)
    }

    /// Case-insensitive guest match.
    pub fn episodes_by_guest(&self, guest: &str) -> Result<Vec<Episode>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE LOWER(guest) = LOWER(?) ORDER BY episode_id ASC, part ASC",
            SELECT_EPISODE
        ))?;
        let episodes = stmt
            .query_map(params![guest], map_episode)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(episodes)
    }

    /// Distinct non-empty categories, sorted.
    pub fn categories(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category FROM episodes
             WHERE category != ''
             ORDER BY category",
        )?;
        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Distinct guests, excluding empty values and the unresolved sentinel.
    pub fn guests(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT guest FROM episodes
             WHERE guest != '' AND guest != ?
             ORDER BY guest",
        )?;
        let guests = stmt
            .query_map(params![UNKNOWN], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(guests)
    }

    /// Uniform random pill, None when there are no pills yet.
    pub fn random_pill(&self) -> Result<Option<Pill>> {
        let conn = self.conn.lock().unwrap();
        let pill = conn
            .query_row(
                "SELECT episode_id, title, description, audio_url
                 FROM pills ORDER BY RANDOM() LIMIT 1",
                [],
                map_pill,
            )
            .ok();
        Ok(pill)
    }

    // =========================================================================
    // Novelty checks and inserts
    // =========================================================================

    /// Novelty check against durable state, never a cached snapshot.
    pub fn episode_exists(&self, episode_id: i64, part: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM episodes WHERE episode_id = ? AND part = ?",
            params![episode_id, part],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn pill_exists(&self, title: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pills WHERE title = ?",
            params![title],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert an episode; `Duplicate` when `(episode_id, part)` is already
    /// stored. The check and the write are a single statement, so two
    /// near-simultaneous ingestion cycles cannot both insert.
    pub fn insert_episode(&self, episode: &Episode) -> Result<InsertOutcome> {
        if episode.episode_id < 0 {
            bail!("episode_id must be >= 0, got {}", episode.episode_id);
        }
        if episode.part < 1 {
            bail!("part must be >= 1, got {}", episode.part);
        }

        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO episodes
             (episode_id, part, title, description, category, guest, audio_url, shownotes_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                episode.episode_id,
                episode.part,
                episode.title,
                episode.description,
                episode.category,
                episode.guest,
                episode.audio_url,
                episode.shownotes_url,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            log::info!(
                "Stored episode {} part {}: {}",
                episode.episode_id,
                episode.part,
                episode.title
            );
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Insert a pill; `Duplicate` keyed by title.
    pub fn insert_pill(&self, pill: &Pill) -> Result<InsertOutcome> {
        if pill.title.is_empty() {
            bail!("pill title must not be empty");
        }

        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO pills (episode_id, title, description, audio_url, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                pill.episode_id,
                pill.title,
                pill.description,
                pill.audio_url,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            log::info!("Stored pill: {}", pill.title);
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Late enrichment backfill: fills guest/shownotes for every part of an
    /// episode number, but only where the field still holds the sentinel.
    /// Returns the number of rows touched.
    pub fn update_enrichment(
        &self,
        episode_id: i64,
        guest: &str,
        shownotes_url: &str,
    ) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE episodes SET
                guest = CASE WHEN guest = ?3 THEN ?1 ELSE guest END,
                shownotes_url = CASE WHEN shownotes_url = ?3 THEN ?2 ELSE shownotes_url END
             WHERE episode_id = ?4
               AND (guest = ?3 OR shownotes_url = ?3)",
            params![guest, shownotes_url, UNKNOWN, episode_id],
        )?;
        Ok(changed)
    }

    // =========================================================================
    // Usage stats
    // =========================================================================

    pub fn append_stat(&self, chat_id: &str, query: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO stats (recorded_at, chat_id, query) VALUES (?, ?, ?)",
            params![chrono::Utc::now().to_rfc3339(), chat_id, query],
        )?;
        Ok(())
    }

    pub fn total_stats(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn top_queries(&self, limit: i64) -> Result<Vec<QueryCount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT query, COUNT(*) as count FROM stats
             GROUP BY query ORDER BY count DESC LIMIT ?",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(QueryCount {
                    label: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // =========================================================================
    // Subscribers
    // =========================================================================

    /// Register a subscriber. A returning subscriber that was deactivated
    /// (e.g. blocked the bot, then came back) is reactivated.
    pub fn add_subscriber(&self, chat_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO subscribers (chat_id, added_at, active) VALUES (?, ?, 1)
             ON CONFLICT(chat_id) DO UPDATE SET active = 1",
            params![chat_id, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Mark a subscriber permanently unreachable. The row is kept so the
    /// stats log still correlates.
    pub fn deactivate_subscriber(&self, chat_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE subscribers SET active = 0 WHERE chat_id = ?",
            params![chat_id],
        )?;
        log::info!("Deactivated subscriber {}", chat_id);
        Ok(())
    }

    /// Active subscribers in registration order.
    pub fn active_subscribers(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT chat_id FROM subscribers WHERE active = 1
             ORDER BY added_at ASC, chat_id ASC",
        )?;
        let subscribers = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subscribers)
    }

    pub fn active_subscriber_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM subscribers WHERE active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // =========================================================================
    // Admin roll-up
    // =========================================================================

    pub fn total_episodes(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn total_pills(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM pills", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn catalog_stats(&self) -> Result<CatalogStats> {
        Ok(CatalogStats {
            total_episodes: self.total_episodes()?,
            total_pills: self.total_pills()?,
            total_categories: self.categories()?.len() as i64,
            total_guests: self.guests()?.len() as i64,
            active_subscribers: self.active_subscriber_count()?,
            total_queries: self.total_stats()?,
            top_queries: self.top_queries(5)?,
        })
    }
}

const SELECT_EPISODE: &str = "SELECT episode_id, part, title, description, category, guest, \
     audio_url, shownotes_url FROM episodes";

fn map_episode(row: &rusqlite::Row) -> rusqlite::Result<Episode> {
    Ok(Episode {
        episode_id: row.get(0)?,
        part: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        guest: row.get(5)?,
        audio_url: row.get(6)?,
        shownotes_url: row.get(7)?,
    })
}

fn map_pill(row: &rusqlite::Row) -> rusqlite::Result<Pill> {
    Ok(Pill {
        episode_id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        audio_url: row.get(3)?,
    })
}
