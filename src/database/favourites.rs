use super::{Database, StoreChange};
use crate::errors::AppResult;
use crate::models::Favourite;
use crate::utils::parse_datetime;
use chrono::Utc;
use sqlx::Row;

impl Database {
    /// Mark or unmark a stream URL as favourite. Returns whether anything changed.
    ///
    /// Favourites are keyed by stream URL and never written by a sync, so they
    /// reattach to the channel on every replacement that keeps its URL.
    pub async fn set_favourite(&self, stream_url: &str, favourite: bool) -> AppResult<bool> {
        let result = if favourite {
            sqlx::query(
                "INSERT INTO favourites (stream_url, created_at) VALUES (?, ?)
                 ON CONFLICT(stream_url) DO NOTHING",
            )
            .bind(stream_url)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query("DELETE FROM favourites WHERE stream_url = ?")
                .bind(stream_url)
                .execute(&self.pool)
                .await?
        };

        let changed = result.rows_affected() > 0;
        if changed {
            self.notify(StoreChange::Favourites);
        }
        Ok(changed)
    }

    pub async fn is_favourite(&self, stream_url: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favourites WHERE stream_url = ?")
            .bind(stream_url)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn list_favourites(&self) -> AppResult<Vec<Favourite>> {
        let rows = sqlx::query("SELECT stream_url, created_at FROM favourites ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> AppResult<Favourite> {
                let created_at: String = row.try_get("created_at")?;
                Ok(Favourite {
                    stream_url: row.try_get("stream_url")?,
                    created_at: parse_datetime(&created_at)?,
                })
            })
            .collect()
    }
}
