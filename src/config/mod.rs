use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Total request timeout for a playlist download
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Playlists larger than this are rejected
    pub max_playlist_bytes: u64,
    /// Cron expression (with seconds field) deciding when a subscription is due
    pub update_cron: String,
    /// Sync never-synced subscriptions on the first scheduler tick
    pub run_missed_immediately: bool,
    pub scheduler_tick_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./m3u-sync.db".to_string(),
            max_connections: Some(5),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: format!("m3u-sync/{}", env!("CARGO_PKG_VERSION")),
            max_playlist_bytes: 64 * 1024 * 1024,
            update_cron: "0 0 */6 * * *".to_string(),
            run_missed_immediately: true,
            scheduler_tick_secs: 30,
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler_tick_secs.max(1))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&config_file)
    }

    /// Read `path`, or write the defaults there when it does not exist yet.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
            Ok(default_config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.database.url, "sqlite://./m3u-sync.db");
        assert_eq!(config.sync.request_timeout(), Duration::from_secs(30));

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.sync.update_cron, config.sync.update_cron);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[sync]\nrequest_timeout_secs = 5\nupdate_cron = \"0 */15 * * * *\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sync.request_timeout_secs, 5);
        assert_eq!(config.sync.update_cron, "0 */15 * * * *");
        assert!(config.sync.run_missed_immediately);
        assert_eq!(config.database.max_connections, Some(5));
    }
}
