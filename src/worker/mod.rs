//! Periodic job scheduler.
//!
//! Two independent loops, one per job, each sleeping its configured
//! interval and then asking the core for a cycle. Overlap protection lives
//! in the core's single-flight gates, so even a manual trigger racing a
//! scheduled tick is safe. Cancellation stops both loops between cycles.

use crate::core::BotCore;
use crate::enrich::MetadataLookup;
use crate::feed::FeedSource;
use crate::ingest::{EpisodeCycleOutcome, PillCycleOutcome};
use crate::notify::{NotificationTransport, OperatorAlert};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run both periodic jobs until the token is cancelled. Never returns an
/// error: every cycle outcome is logged and the next tick is awaited.
pub async fn run_scheduler<F, M, N, A>(core: Arc<BotCore<F, M, N, A>>, cancel: CancellationToken)
where
    F: FeedSource,
    M: MetadataLookup,
    N: NotificationTransport,
    A: OperatorAlert,
{
    let episode_interval = core.config().episode_check_interval();
    let pill_interval = core.config().pill_check_interval();

    log::info!(
        "Scheduler started (episode check every {:?}, pill check every {:?})",
        episode_interval,
        pill_interval
    );

    let episode_core = core.clone();
    let episode_cancel = cancel.clone();
    let episode_loop = async move {
        loop {
            tokio::select! {
                _ = episode_cancel.cancelled() => break,
                _ = tokio::time::sleep(episode_interval) => {}
            }

            match episode_core.run_episode_check_cycle().await {
                EpisodeCycleOutcome::NoNewEpisode => {}
                EpisodeCycleOutcome::Committed { episode, fanout } => {
                    log::info!(
                        "Committed episode {} part {} ({} notified, {} failed)",
                        episode.episode_id,
                        episode.part,
                        fanout.sent,
                        fanout.failed
                    );
                }
                EpisodeCycleOutcome::Failed(stage) => {
                    log::error!("Episode check failed at {}, retrying next tick", stage);
                }
                EpisodeCycleOutcome::AlreadyRunning => {}
            }
        }
    };

    let pill_core = core.clone();
    let pill_cancel = cancel.clone();
    let pill_loop = async move {
        loop {
            tokio::select! {
                _ = pill_cancel.cancelled() => break,
                _ = tokio::time::sleep(pill_interval) => {}
            }

            match pill_core.run_pill_check_cycle().await {
                PillCycleOutcome::NoNewPill => {}
                PillCycleOutcome::Committed(pill) => {
                    log::info!("Committed pill: {}", pill.title);
                }
                PillCycleOutcome::Failed(stage) => {
                    log::error!("Pill check failed at {}, retrying next tick", stage);
                }
                PillCycleOutcome::AlreadyRunning => {}
            }
        }
    };

    tokio::join!(episode_loop, pill_loop);

    log::info!("Scheduler stopped");
}
