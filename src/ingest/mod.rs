//! Ingestion cycles for new episodes and pills.
//!
//! One cycle per scheduler tick, each a short state machine:
//! episodes run Fetch → CheckNovelty → Enrich → Commit → Notify, pills run
//! Fetch → CheckNovelty → Commit. A cycle never retries on its own; the
//! periodic schedule is the retry mechanism. Nothing in here panics or
//! propagates an error to the scheduler: every failure collapses into a
//! logged `Failed(stage)` outcome.

use crate::database::{Database, Episode, InsertOutcome, Pill, UNKNOWN};
use crate::enrich::{EpisodeMetadata, MetadataLookup};
use crate::feed::{self, FeedSource};
use crate::notify::{notify_subscribers, FanoutSummary, NotificationTransport, OperatorAlert};

/// Pipeline stage a cycle died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    CheckNovelty,
    Enrich,
    Commit,
    Notify,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::CheckNovelty => write!(f, "check-novelty"),
            Self::Enrich => write!(f, "enrich"),
            Self::Commit => write!(f, "commit"),
            Self::Notify => write!(f, "notify"),
        }
    }
}

/// Terminal outcome of one episode check cycle.
#[derive(Debug)]
pub enum EpisodeCycleOutcome {
    /// The feed's latest item is already stored, not an episode, or the
    /// feed is empty.
    NoNewEpisode,
    /// A new episode was committed and fanout ran.
    Committed {
        episode: Episode,
        fanout: FanoutSummary,
    },
    /// The cycle was abandoned; retried at the next scheduled tick.
    Failed(Stage),
    /// Another cycle of the same job was still in flight (single-flight).
    AlreadyRunning,
}

/// Terminal outcome of one pill check cycle.
#[derive(Debug)]
pub enum PillCycleOutcome {
    NoNewPill,
    Committed(Pill),
    Failed(Stage),
    AlreadyRunning,
}

/// Run one episode ingestion cycle against the given collaborators.
pub async fn run_episode_cycle<F, M, N, A>(
    db: &Database,
    feed_source: &F,
    lookup: &M,
    transport: &N,
    alerts: &A,
    feed_url: &str,
    title_prefix: &str,
) -> EpisodeCycleOutcome
where
    F: FeedSource,
    M: MetadataLookup,
    N: NotificationTransport,
    A: OperatorAlert,
{
    log::info!("Running episode check...");

    // Fetch
    let item = match feed_source.fetch_latest(feed_url).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            log::info!("Episode feed is empty");
            return EpisodeCycleOutcome::NoNewEpisode;
        }
        Err(e) => {
            log::error!("Episode feed fetch failed: {}", e);
            alerts
                .notify_operator(&format!("❌ Errore nel check episodi: {}", e))
                .await;
            return EpisodeCycleOutcome::Failed(Stage::Fetch);
        }
    };

    let title = feed::strip_title_prefix(&item.title, title_prefix).to_string();

    // Items without the numbering convention (trailers, announcements) are
    // expected now and then; log and move on without bothering the operator.
    let Some((episode_id, part)) = feed::parse_title_numbering(&title) else {
        log::info!("Feed item is not an episode, skipping: {}", item.title);
        return EpisodeCycleOutcome::NoNewEpisode;
    };

    // CheckNovelty — short-circuits everything downstream, so an already
    // stored episode can never be re-enriched or re-announced.
    match db.episode_exists(episode_id, part) {
        Ok(true) => {
            log::info!("No new episode (latest is {} part {})", episode_id, part);
            return EpisodeCycleOutcome::NoNewEpisode;
        }
        Ok(false) => {}
        Err(e) => {
            log::error!("Novelty check failed: {}", e);
            return EpisodeCycleOutcome::Failed(Stage::CheckNovelty);
        }
    }

    log::info!("New episode detected: {}", title);

    // Enrich — best-effort; a failed or partial lookup degrades to the
    // sentinel and the episode is committed anyway.
    let category = feed::derive_category(&title, episode_id);
    let metadata = match lookup.lookup(episode_id).await {
        Ok(metadata) => metadata.sanitize(),
        Err(e) => {
            log::warn!("Enrichment failed for episode {}: {}", episode_id, e);
            EpisodeMetadata::unknown()
        }
    };

    if metadata.is_degraded() {
        alerts
            .notify_operator(&format!(
                "⚠️ Metadati incompleti per l'episodio {}: ospite e shownotes da completare a mano",
                episode_id
            ))
            .await;
    }

    let episode = Episode {
        episode_id,
        part,
        title,
        description: item.description,
        category,
        guest: metadata.guest,
        audio_url: if item.external_url.is_empty() {
            UNKNOWN.to_string()
        } else {
            item.external_url
        },
        shownotes_url: metadata.shownotes_url,
    };

    // Commit — a duplicate here means another cycle won the race; that is
    // success-no-op, not an error.
    match db.insert_episode(&episode) {
        Ok(InsertOutcome::Inserted) => {}
        Ok(InsertOutcome::Duplicate) => {
            log::info!(
                "Episode {} part {} was committed concurrently",
                episode.episode_id,
                episode.part
            );
            return EpisodeCycleOutcome::NoNewEpisode;
        }
        Err(e) => {
            log::error!("Failed to commit episode: {}", e);
            alerts
                .notify_operator(&format!("❌ Errore nel salvataggio dell'episodio: {}", e))
                .await;
            return EpisodeCycleOutcome::Failed(Stage::Commit);
        }
    }

    // Notify — the commit already happened; fanout problems are the
    // fanout's to report and never change the cycle outcome.
    let fanout = notify_subscribers(db, transport, alerts, &episode).await;

    EpisodeCycleOutcome::Committed { episode, fanout }
}

/// Run one pill ingestion cycle. Pills are not broadcast; the operator
/// gets a heads-up and that is all.
pub async fn run_pill_cycle<F, A>(
    db: &Database,
    feed_source: &F,
    alerts: &A,
    feed_url: &str,
) -> PillCycleOutcome
where
    F: FeedSource,
    A: OperatorAlert,
{
    log::info!("Running pill check...");

    let item = match feed_source.fetch_latest(feed_url).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            log::info!("Pill feed is empty");
            return PillCycleOutcome::NoNewPill;
        }
        Err(e) => {
            log::error!("Pill feed fetch failed: {}", e);
            alerts
                .notify_operator(&format!("❌ Errore nel check pillole: {}", e))
                .await;
            return PillCycleOutcome::Failed(Stage::Fetch);
        }
    };

    let title = item.title.trim().to_string();
    if title.is_empty() {
        log::info!("Pill feed item has no title, skipping");
        return PillCycleOutcome::NoNewPill;
    }

    match db.pill_exists(&title) {
        Ok(true) => {
            log::info!("No new pill (latest is '{}')", title);
            return PillCycleOutcome::NoNewPill;
        }
        Ok(false) => {}
        Err(e) => {
            log::error!("Pill novelty check failed: {}", e);
            return PillCycleOutcome::Failed(Stage::CheckNovelty);
        }
    }

    let pill = Pill {
        episode_id: feed::linked_episode_id(&item.description),
        title,
        description: item.description,
        audio_url: if item.external_url.is_empty() {
            UNKNOWN.to_string()
        } else {
            item.external_url
        },
    };

    match db.insert_pill(&pill) {
        Ok(InsertOutcome::Inserted) => {}
        Ok(InsertOutcome::Duplicate) => {
            log::info!("Pill '{}' was committed concurrently", pill.title);
            return PillCycleOutcome::NoNewPill;
        }
        Err(e) => {
            log::error!("Failed to commit pill: {}", e);
            alerts
                .notify_operator(&format!("❌ Errore nel salvataggio della pillola: {}", e))
                .await;
            return PillCycleOutcome::Failed(Stage::Commit);
        }
    }

    alerts
        .notify_operator(&format!("💊 Nuova pillola aggiunta: {}", pill.title))
        .await;

    PillCycleOutcome::Committed(pill)
}
