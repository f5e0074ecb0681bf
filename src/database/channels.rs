use super::subscriptions::upsert_subscription_row;
use super::{Database, StoreChange};
use crate::errors::AppResult;
use crate::models::{ChannelFilter, ChannelRecord, StoredChannel, SyncSummary};
use crate::utils::UrlUtils;
use async_stream::stream;
use chrono::Utc;
use futures::stream::BoxStream;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use std::collections::BTreeSet;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};

const CHANNEL_SELECT: &str = "SELECT c.id, c.position, c.tvg_id, c.tvg_name, c.group_title, c.title,
            c.cover, c.stream_url, c.subscription_url,
            EXISTS(SELECT 1 FROM favourites f WHERE f.stream_url = c.stream_url) AS favourite
     FROM channels c";

impl Database {
    /// Replace the channel set of one subscription.
    ///
    /// The subscription upsert, the delete, every insert and the
    /// `last_synced_at` stamp commit together or not at all.
    pub async fn replace_subscription_channels(
        &self,
        title: &str,
        url: &str,
        records: &[ChannelRecord],
    ) -> AppResult<SyncSummary> {
        let display_url = UrlUtils::obfuscate_credentials(url);
        info!("Replacing channels for {} with {} records", display_url, records.len());

        let _lock = self.acquire_channel_update_lock().await;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        upsert_subscription_row(&mut *tx, title, url, now).await?;

        let removed = sqlx::query("DELETE FROM channels WHERE subscription_url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!("Deleted {} existing channels for {}", removed, display_url);

        for (position, record) in records.iter().enumerate() {
            insert_channel_row(&mut *tx, url, position as i64, record)
                .await
                .map_err(|e| {
                    error!(
                        "Failed to insert channel '{}' for {}: {}",
                        record.title, display_url, e
                    );
                    e
                })?;
        }

        sqlx::query("UPDATE subscriptions SET last_synced_at = ? WHERE url = ?")
            .bind(now.to_rfc3339())
            .bind(url)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.notify(StoreChange::Channels {
            subscription_url: url.to_string(),
        });

        info!("Stored {} channels for {}", records.len(), display_url);
        Ok(SyncSummary {
            subscription_url: url.to_string(),
            channels_saved: records.len(),
            channels_removed: removed as usize,
        })
    }

    pub async fn delete_channels(&self, subscription_url: &str) -> AppResult<u64> {
        let _lock = self.acquire_channel_update_lock().await;
        let removed = sqlx::query("DELETE FROM channels WHERE subscription_url = ?")
            .bind(subscription_url)
            .execute(&self.pool)
            .await?
            .rows_affected();

        self.notify(StoreChange::Channels {
            subscription_url: subscription_url.to_string(),
        });
        Ok(removed)
    }

    /// Append records after the existing channels of their subscription.
    /// The subscriptions must already exist.
    pub async fn insert_channels(&self, records: &[ChannelRecord]) -> AppResult<u64> {
        let _lock = self.acquire_channel_update_lock().await;
        let mut tx = self.pool.begin().await?;

        for record in records {
            let position: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM channels WHERE subscription_url = ?",
            )
            .bind(&record.subscription_url)
            .fetch_one(&mut *tx)
            .await?;
            insert_channel_row(&mut *tx, &record.subscription_url, position, record).await?;
        }

        tx.commit().await?;

        let touched: BTreeSet<&str> = records
            .iter()
            .map(|record| record.subscription_url.as_str())
            .collect();
        for subscription_url in touched {
            self.notify(StoreChange::Channels {
                subscription_url: subscription_url.to_string(),
            });
        }
        Ok(records.len() as u64)
    }

    /// Channels in playlist order, grouped by subscription
    pub async fn get_channels(&self, filter: &ChannelFilter) -> AppResult<Vec<StoredChannel>> {
        let rows = match filter {
            ChannelFilter::All => {
                sqlx::query(&format!(
                    "{CHANNEL_SELECT} ORDER BY c.subscription_url, c.position"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            ChannelFilter::Subscription(url) => {
                sqlx::query(&format!(
                    "{CHANNEL_SELECT} WHERE c.subscription_url = ? ORDER BY c.position"
                ))
                .bind(url)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(channel_from_row).collect()
    }

    /// Live view of the channels matching `filter`.
    pub fn observe_channels(
        &self,
        filter: ChannelFilter,
    ) -> BoxStream<'static, AppResult<Vec<StoredChannel>>> {
        let database = self.clone();
        // Subscribe before the first read so no commit slips between the two
        let mut changes = self.subscribe_changes();

        Box::pin(stream! {
            yield database.get_channels(&filter).await;
            loop {
                match changes.recv().await {
                    Ok(change) if change.affects(&filter) => {
                        yield database.get_channels(&filter).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Channel observer lagged by {} changes", skipped);
                        yield database.get_channels(&filter).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

async fn insert_channel_row<'e, E>(
    executor: E,
    subscription_url: &str,
    position: i64,
    record: &ChannelRecord,
) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO channels
         (subscription_url, position, tvg_id, tvg_name, group_title, title, cover, stream_url)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(subscription_url)
    .bind(position)
    .bind(&record.id)
    .bind(&record.name)
    .bind(&record.group)
    .bind(&record.title)
    .bind(&record.cover)
    .bind(&record.stream_url)
    .execute(executor)
    .await?;
    Ok(())
}

fn channel_from_row(row: &SqliteRow) -> AppResult<StoredChannel> {
    let favourite: i64 = row.try_get("favourite")?;
    Ok(StoredChannel {
        row_id: row.try_get("id")?,
        position: row.try_get("position")?,
        record: ChannelRecord {
            id: row.try_get("tvg_id")?,
            name: row.try_get("tvg_name")?,
            group: row.try_get("group_title")?,
            title: row.try_get("title")?,
            cover: row.try_get("cover")?,
            stream_url: row.try_get("stream_url")?,
            subscription_url: row.try_get("subscription_url")?,
        },
        favourite: favourite != 0,
    })
}
