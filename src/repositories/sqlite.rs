//! [`ChannelStore`] on top of the SQLite [`Database`]

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::traits::ChannelStore;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{ChannelFilter, ChannelRecord, StoredChannel, Subscription, SyncSummary};

#[async_trait]
impl ChannelStore for Database {
    async fn upsert_subscription(&self, title: &str, url: &str) -> AppResult<Subscription> {
        Database::upsert_subscription(self, title, url).await
    }

    async fn get_subscription(&self, url: &str) -> AppResult<Option<Subscription>> {
        Database::get_subscription(self, url).await
    }

    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>> {
        Database::list_subscriptions(self).await
    }

    async fn delete_channels(&self, subscription_url: &str) -> AppResult<u64> {
        Database::delete_channels(self, subscription_url).await
    }

    async fn insert_channels(&self, records: &[ChannelRecord]) -> AppResult<u64> {
        Database::insert_channels(self, records).await
    }

    async fn replace_subscription_channels(
        &self,
        title: &str,
        url: &str,
        records: &[ChannelRecord],
    ) -> AppResult<SyncSummary> {
        Database::replace_subscription_channels(self, title, url, records).await
    }

    async fn get_channels(&self, filter: &ChannelFilter) -> AppResult<Vec<StoredChannel>> {
        Database::get_channels(self, filter).await
    }

    fn observe_channels(
        &self,
        filter: ChannelFilter,
    ) -> BoxStream<'static, AppResult<Vec<StoredChannel>>> {
        Database::observe_channels(self, filter)
    }
}
