//! Headless ingestion daemon.
//!
//! Runs the periodic episode and pill checks without a chat layer
//! attached: deliveries go to the log and operator alerts land in the log
//! too. The real bot embeds [`office_of_cards_bot::BotCore`] with its own
//! transport instead.

use anyhow::Result;
use office_of_cards_bot::notify::{LogOnlyTransport, OperatorLog};
use office_of_cards_bot::{worker, BotCore, Config, Database, GuestPageClient, RssFeedClient};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let config = Config::load_or_default(&config_path)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let db = Arc::new(Database::new(&config.db_path())?);
    log::info!("Catalog opened at {:?}", config.db_path());

    let core = Arc::new(BotCore::new(
        db,
        RssFeedClient::new(config.http_timeout()),
        GuestPageClient::new(&config.guest_page_url, config.http_timeout()),
        LogOnlyTransport,
        OperatorLog,
        config,
    ));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    worker::run_scheduler(core, cancel).await;

    Ok(())
}
