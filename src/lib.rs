//! Catalog query and ingestion core for the Office of Cards podcast bot.
//!
//! The chat transport and the scheduler trigger live outside this crate;
//! they talk to [`BotCore`], which owns the SQLite catalog, the query
//! resolver and the single-flight ingestion cycles. External services
//! (podcast feed, guest page, message delivery, operator alerts) are
//! traits with HTTP implementations where this crate provides one.

pub mod config;
pub mod core;
pub mod database;
pub mod enrich;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod notify;
pub mod resolver;
pub mod worker;

pub use self::core::BotCore;
pub use config::Config;
pub use database::{CatalogStats, Database, Episode, InsertOutcome, Pill, UNKNOWN};
pub use enrich::{EpisodeMetadata, GuestPageClient, MetadataLookup};
pub use error::CoreError;
pub use feed::{FeedItem, FeedSource, RssFeedClient};
pub use ingest::{EpisodeCycleOutcome, PillCycleOutcome, Stage};
pub use notify::{
    Delivery, FanoutSummary, MessageButton, NotificationTransport, OperatorAlert,
};
pub use resolver::{Resolution, resolve};
