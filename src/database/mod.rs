use crate::assets::MigrationAssets;
use crate::config::DatabaseConfig;
use crate::errors::{AppResult, RepositoryError};
use crate::models::ChannelFilter;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

pub mod channels;
pub mod favourites;
pub mod subscriptions;

/// A committed write, announced to channel observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Channels { subscription_url: String },
    Favourites,
}

impl StoreChange {
    pub fn affects(&self, filter: &ChannelFilter) -> bool {
        match self {
            StoreChange::Channels { subscription_url } => filter.matches(subscription_url),
            StoreChange::Favourites => true,
        }
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    channel_update_lock: Arc<Mutex<()>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to :memory: opens its own database, so keep exactly one alive
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.unwrap_or(5))
        };

        let pool = pool_options.connect_with(options).await?;
        let (changes, _) = broadcast::channel(64);

        Ok(Self {
            pool,
            channel_update_lock: Arc::new(Mutex::new(())),
            changes,
        })
    }

    /// Private in-memory database with migrations applied
    pub async fn in_memory() -> AppResult<Self> {
        let database = Self::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
        })
        .await?;
        database.migrate().await?;
        Ok(database)
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for (name, content) in MigrationAssets::get_migrations() {
            // "001_initial_schema.sql" -> 1
            let version: i64 = name
                .split('_')
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| RepositoryError::MigrationFailed {
                    version: name.clone(),
                    message: "file name has no numeric version prefix".to_string(),
                })?;

            let applied = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            )
            .bind(version)
            .fetch_one(&self.pool)
            .await?;
            if applied > 0 {
                continue;
            }

            let start = std::time::Instant::now();
            let mut transaction = self.pool.begin().await?;

            for statement in content.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                sqlx::query(statement)
                    .execute(&mut *transaction)
                    .await
                    .map_err(|e| RepositoryError::MigrationFailed {
                        version: name.clone(),
                        message: e.to_string(),
                    })?;
            }

            sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
                .bind(version)
                .bind(&name)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *transaction)
                .await?;

            transaction.commit().await?;
            info!(
                "Applied migration: {} ({}ms)",
                name,
                start.elapsed().as_millis()
            );
        }

        Ok(())
    }

    pub async fn acquire_channel_update_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.channel_update_lock.lock().await
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn notify(&self, change: StoreChange) {
        debug!("Store change: {:?}", change);
        // No receivers just means nobody is observing
        let _ = self.changes.send(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let database = Database::in_memory().await.unwrap();
        database.migrate().await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&database.pool())
            .await
            .unwrap();
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("sync.db").display());

        let database = Database::new(&DatabaseConfig {
            url,
            max_connections: Some(2),
        })
        .await
        .unwrap();
        database.migrate().await.unwrap();

        assert!(dir.path().join("sync.db").exists());
    }

    #[test]
    fn test_store_change_filtering() {
        let change = StoreChange::Channels {
            subscription_url: "http://a/list.m3u".to_string(),
        };
        assert!(change.affects(&ChannelFilter::All));
        assert!(change.affects(&ChannelFilter::Subscription("http://a/list.m3u".to_string())));
        assert!(!change.affects(&ChannelFilter::Subscription("http://b/list.m3u".to_string())));
        assert!(StoreChange::Favourites.affects(&ChannelFilter::Subscription("x".to_string())));
    }
}
