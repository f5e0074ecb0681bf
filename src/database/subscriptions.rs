use super::{Database, StoreChange};
use crate::errors::{AppError, AppResult};
use crate::models::Subscription;
use crate::utils::{parse_datetime, UrlUtils};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use tracing::info;

const SUBSCRIPTION_COLUMNS: &str = "url, title, created_at, updated_at, last_synced_at";

impl Database {
    pub async fn upsert_subscription(&self, title: &str, url: &str) -> AppResult<Subscription> {
        upsert_subscription_row(&self.pool, title, url, Utc::now()).await?;
        self.get_subscription(url).await?.ok_or_else(|| {
            AppError::internal(format!(
                "Subscription {} vanished after upsert",
                UrlUtils::obfuscate_credentials(url)
            ))
        })
    }

    pub async fn get_subscription(&self, url: &str) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    pub async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY title, url"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    /// Remove a subscription together with its channels. Favourites stay.
    pub async fn unsubscribe(&self, url: &str) -> AppResult<bool> {
        let _lock = self.acquire_channel_update_lock().await;
        let mut tx = self.pool.begin().await?;

        let channels = sqlx::query("DELETE FROM channels WHERE subscription_url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM subscriptions WHERE url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        if deleted {
            info!(
                "Removed subscription {} and {} channels",
                UrlUtils::obfuscate_credentials(url),
                channels
            );
            self.notify(StoreChange::Channels {
                subscription_url: url.to_string(),
            });
        }
        Ok(deleted)
    }
}

/// Insert a subscription or refresh its title; `url` is its identity.
pub(super) async fn upsert_subscription_row<'e, E>(
    executor: E,
    title: &str,
    url: &str,
    now: DateTime<Utc>,
) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = now.to_rfc3339();
    sqlx::query(
        "INSERT INTO subscriptions (url, title, created_at, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(url) DO UPDATE SET title = excluded.title, updated_at = excluded.updated_at",
    )
    .bind(url)
    .bind(title)
    .bind(&now)
    .bind(&now)
    .execute(executor)
    .await?;
    Ok(())
}

fn subscription_from_row(row: &SqliteRow) -> AppResult<Subscription> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let last_synced_at: Option<String> = row.try_get("last_synced_at")?;

    Ok(Subscription {
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
        last_synced_at: last_synced_at.as_deref().map(parse_datetime).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_keeps_identity_and_updates_title() {
        let database = Database::in_memory().await.unwrap();

        let first = database
            .upsert_subscription("Old", "http://example.com/list.m3u")
            .await
            .unwrap();
        let second = database
            .upsert_subscription("New", "http://example.com/list.m3u")
            .await
            .unwrap();

        assert_eq!(second.title, "New");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_synced_at.is_none());
        assert_eq!(database.list_subscriptions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_missing_url() {
        let database = Database::in_memory().await.unwrap();
        assert!(!database.unsubscribe("http://nowhere/x.m3u").await.unwrap());
        assert!(database
            .get_subscription("http://nowhere/x.m3u")
            .await
            .unwrap()
            .is_none());
    }
}
