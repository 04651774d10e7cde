//! Notification fanout to subscribed users.
//!
//! Delivery is attempted once per active subscriber, sequentially and in
//! isolation: one failure never blocks the rest, and there is no retry
//! queue. A permanently unreachable subscriber (revoked access) is
//! deactivated on the spot; transient failures just count against the
//! round.

use crate::database::{Database, Episode, UNKNOWN};
use async_trait::async_trait;
use serde::Serialize;

/// Per-subscriber delivery verdict reported by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Delivered,
    /// Worth trying again on a future episode (network hiccup, rate limit).
    TransientFailure(String),
    /// The recipient is gone for good (e.g. blocked the bot).
    PermanentFailure(String),
}

/// Inline button attached to a delivered message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageButton {
    pub label: String,
    pub url: String,
}

/// Chat transport owned by the excluded chat layer.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str, buttons: &[MessageButton]) -> Delivery;
}

/// Operational alert sink. Best-effort by contract: implementations
/// swallow their own failures.
#[async_trait]
pub trait OperatorAlert: Send + Sync {
    async fn notify_operator(&self, text: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FanoutSummary {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub deactivated: usize,
}

/// Buttons for an episode message; sentinel links are omitted.
pub fn episode_buttons(episode: &Episode) -> Vec<MessageButton> {
    let mut buttons = Vec::new();
    if episode.audio_url != UNKNOWN && !episode.audio_url.is_empty() {
        buttons.push(MessageButton {
            label: "🎧 Ascolta l'episodio 🎧".to_string(),
            url: episode.audio_url.clone(),
        });
    }
    if episode.shownotes_url != UNKNOWN && !episode.shownotes_url.is_empty() {
        buttons.push(MessageButton {
            label: "📝 Shownotes 📝".to_string(),
            url: episode.shownotes_url.clone(),
        });
    }
    buttons
}

/// Body of the new-episode announcement.
pub fn announcement_text(episode: &Episode) -> String {
    format!(
        "🎉 Nuovo episodio del tuo podcast preferito!\n\n{}\n\n{}",
        episode.title, episode.description
    )
}

/// Deliver a newly committed episode to every active subscriber.
///
/// The subscriber list is snapshotted at the start of the round; everyone
/// on it is attempted exactly once. Emits a count summary to the operator
/// when at least one delivery was attempted.
pub async fn notify_subscribers<T, A>(
    db: &Database,
    transport: &T,
    alerts: &A,
    episode: &Episode,
) -> FanoutSummary
where
    T: NotificationTransport,
    A: OperatorAlert,
{
    let subscribers = match db.active_subscribers() {
        Ok(subscribers) => subscribers,
        Err(e) => {
            log::error!("Failed to load subscriber list: {}", e);
            return FanoutSummary::default();
        }
    };

    let text = announcement_text(episode);
    let buttons = episode_buttons(episode);

    let mut summary = FanoutSummary {
        attempted: subscribers.len(),
        ..Default::default()
    };

    for chat_id in &subscribers {
        match transport.send(chat_id, &text, &buttons).await {
            Delivery::Delivered => summary.sent += 1,
            Delivery::TransientFailure(reason) => {
                log::warn!("Failed to notify {}: {}", chat_id, reason);
                summary.failed += 1;
            }
            Delivery::PermanentFailure(reason) => {
                log::warn!("Subscriber {} unreachable for good: {}", chat_id, reason);
                summary.failed += 1;
                if let Err(e) = db.deactivate_subscriber(chat_id) {
                    log::error!("Failed to deactivate subscriber {}: {}", chat_id, e);
                } else {
                    summary.deactivated += 1;
                }
            }
        }
    }

    log::info!(
        "Episode notification complete: {} sent, {} failed",
        summary.sent,
        summary.failed
    );

    if summary.attempted > 0 {
        alerts
            .notify_operator(&format!(
                "✅ Nuovo episodio pubblicato e notificato\n📊 {} utenti notificati, {} falliti\n🎧 {}",
                summary.sent, summary.failed, episode.title
            ))
            .await;
    }

    summary
}

// ============================================================================
// Standalone implementations for the headless daemon
// ============================================================================

/// Transport used when the core runs without a chat layer attached: the
/// announcement goes to the log and counts as delivered.
pub struct LogOnlyTransport;

#[async_trait]
impl NotificationTransport for LogOnlyTransport {
    async fn send(&self, chat_id: &str, text: &str, _buttons: &[MessageButton]) -> Delivery {
        log::info!("[dry-run] would notify {}: {}", chat_id, text);
        Delivery::Delivered
    }
}

/// Operator sink that writes to the log.
pub struct OperatorLog;

#[async_trait]
impl OperatorAlert for OperatorLog {
    async fn notify_operator(&self, text: &str) {
        log::warn!("[operator] {}", text);
    }
}
