//! The facade the chat layer and the scheduler talk to.
//!
//! `BotCore` owns the store and the external collaborators and is the only
//! place holding the single-flight gates for the periodic jobs: a cycle
//! that finds its gate taken reports `AlreadyRunning` and touches nothing.

use crate::config::Config;
use crate::database::{CatalogStats, Database, Episode, Pill, UNKNOWN};
use crate::enrich::MetadataLookup;
use crate::feed::FeedSource;
use crate::ingest::{
    run_episode_cycle, run_pill_cycle, EpisodeCycleOutcome, PillCycleOutcome,
};
use crate::notify::{NotificationTransport, OperatorAlert};
use crate::resolver::{self, Resolution};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct BotCore<F, M, N, A> {
    db: Arc<Database>,
    feed: F,
    lookup: M,
    transport: N,
    alerts: A,
    config: Config,
    episode_gate: Mutex<()>,
    pill_gate: Mutex<()>,
}

impl<F, M, N, A> BotCore<F, M, N, A>
where
    F: FeedSource,
    M: MetadataLookup,
    N: NotificationTransport,
    A: OperatorAlert,
{
    pub fn new(
        db: Arc<Database>,
        feed: F,
        lookup: M,
        transport: N,
        alerts: A,
        config: Config,
    ) -> Self {
        Self {
            db,
            feed,
            lookup,
            transport,
            alerts,
            config,
            episode_gate: Mutex::new(()),
            pill_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Interactive query surface
    // =========================================================================

    /// Resolve free-form user text against the catalog. Read-only; the
    /// caller logs the query via `record_query` once it has a label for it.
    pub fn resolve(&self, text: &str) -> Result<Resolution> {
        resolver::resolve(&self.db, text)
    }

    pub fn last_episode(&self) -> Result<Option<Episode>> {
        self.db.last_episode()
    }

    pub fn random_pill(&self) -> Result<Option<Pill>> {
        self.db.random_pill()
    }

    /// Categories for the search menu.
    pub fn categories(&self) -> Result<Vec<String>> {
        self.db.categories()
    }

    /// Guests for the search menu.
    pub fn guests(&self) -> Result<Vec<String>> {
        self.db.guests()
    }

    // =========================================================================
    // Admin / stats surface
    // =========================================================================

    pub fn record_query(&self, chat_id: &str, label: &str) -> Result<()> {
        self.db.append_stat(chat_id, label)
    }

    pub fn register_subscriber(&self, chat_id: &str) -> Result<()> {
        self.db.add_subscriber(chat_id)
    }

    pub fn active_subscriber_count(&self) -> Result<i64> {
        self.db.active_subscriber_count()
    }

    pub fn catalog_stats(&self) -> Result<CatalogStats> {
        self.db.catalog_stats()
    }

    // =========================================================================
    // Periodic jobs
    // =========================================================================

    /// One episode check cycle. Single-flight: a tick that lands while the
    /// previous cycle is still in flight is skipped, not queued.
    pub async fn run_episode_check_cycle(&self) -> EpisodeCycleOutcome {
        let Ok(_guard) = self.episode_gate.try_lock() else {
            log::warn!("Episode check already in flight, skipping this tick");
            return EpisodeCycleOutcome::AlreadyRunning;
        };

        run_episode_cycle(
            &self.db,
            &self.feed,
            &self.lookup,
            &self.transport,
            &self.alerts,
            &self.config.episodes_feed_url,
            &self.config.title_prefix,
        )
        .await
    }

    /// One pill check cycle, single-flight like the episode check.
    pub async fn run_pill_check_cycle(&self) -> PillCycleOutcome {
        let Ok(_guard) = self.pill_gate.try_lock() else {
            log::warn!("Pill check already in flight, skipping this tick");
            return PillCycleOutcome::AlreadyRunning;
        };

        run_pill_cycle(&self.db, &self.feed, &self.alerts, &self.config.pills_feed_url).await
    }

    /// Re-attempt enrichment for an episode whose guest/shownotes are still
    /// the sentinel. Returns the number of rows backfilled.
    pub async fn refresh_episode_metadata(&self, episode_id: i64) -> Result<usize> {
        let metadata = match self.lookup.lookup(episode_id).await {
            Ok(metadata) => metadata.sanitize(),
            Err(e) => {
                log::warn!("Metadata refresh failed for episode {}: {}", episode_id, e);
                return Ok(0);
            }
        };

        if metadata.guest == UNKNOWN && metadata.shownotes_url == UNKNOWN {
            return Ok(0);
        }

        self.db
            .update_enrichment(episode_id, &metadata.guest, &metadata.shownotes_url)
    }
}
