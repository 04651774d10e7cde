//! Runtime configuration, loaded from a YAML file with sensible defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the SQLite catalog.
    pub data_dir: PathBuf,
    /// RSS feed with the full episodes.
    pub episodes_feed_url: String,
    /// RSS feed with the short-form pills.
    pub pills_feed_url: String,
    /// Companion website page listing guests and shownotes.
    pub guest_page_url: String,
    /// Show prefix some feeds prepend to every title; stripped before the
    /// numbering convention is parsed. Empty disables stripping.
    pub title_prefix: String,
    pub episode_check_interval_secs: u64,
    pub pill_check_interval_secs: u64,
    /// Request timeout for all outbound HTTP (feed and guest page).
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            episodes_feed_url: "https://feeds.megaphone.fm/officeofcards".to_string(),
            pills_feed_url: "https://feeds.megaphone.fm/MNTHA6100943921".to_string(),
            guest_page_url: "https://officeofcards.com/ospite/".to_string(),
            title_prefix: "Office of Cards -".to_string(),
            episode_check_interval_secs: 6 * 60 * 60,
            pill_check_interval_secs: 24 * 60 * 60,
            http_timeout_secs: 30,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("office-of-cards-bot"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Load the config, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("Config file {:?} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("bot.db")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn episode_check_interval(&self) -> Duration {
        Duration::from_secs(self.episode_check_interval_secs)
    }

    pub fn pill_check_interval(&self) -> Duration {
        Duration::from_secs(self.pill_check_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert!(config.episodes_feed_url.starts_with("https://"));
        assert!(config.http_timeout_secs > 0);
        assert!(config.db_path().ends_with("bot.db"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "episodes_feed_url: https://example.com/feed\nhttp_timeout_secs: 5\n",
        )
        .unwrap();
        assert_eq!(config.episodes_feed_url, "https://example.com/feed");
        assert_eq!(config.http_timeout_secs, 5);
        // Untouched fields keep their defaults
        assert_eq!(config.title_prefix, "Office of Cards -");
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let parsed = serde_yaml::from_str::<Config>("no_such_field: 1\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/definitely/not/here.yaml")).unwrap();
        assert_eq!(config.pill_check_interval_secs, 24 * 60 * 60);
    }
}
