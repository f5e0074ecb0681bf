//! Storage contract used by the synchronizer and the read path

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::AppResult;
use crate::models::{ChannelFilter, ChannelRecord, StoredChannel, Subscription, SyncSummary};

/// Channel and subscription storage.
///
/// Only the synchronizer writes channels. Readers must observe either the
/// channel set before a replacement or the one after it, never a mix.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Insert the subscription, or update its title when `url` already exists.
    async fn upsert_subscription(&self, title: &str, url: &str) -> AppResult<Subscription>;

    async fn get_subscription(&self, url: &str) -> AppResult<Option<Subscription>>;

    async fn list_subscriptions(&self) -> AppResult<Vec<Subscription>>;

    /// Delete every channel of `subscription_url`, returning how many went.
    async fn delete_channels(&self, subscription_url: &str) -> AppResult<u64>;

    /// Append records after the ones already stored for their subscription.
    async fn insert_channels(&self, records: &[ChannelRecord]) -> AppResult<u64>;

    /// Upsert the subscription and swap its channel set for `records` in a
    /// single transaction.
    async fn replace_subscription_channels(
        &self,
        title: &str,
        url: &str,
        records: &[ChannelRecord],
    ) -> AppResult<SyncSummary>;

    async fn get_channels(&self, filter: &ChannelFilter) -> AppResult<Vec<StoredChannel>>;

    /// Current snapshot, followed by a fresh snapshot after every committed
    /// change that affects `filter`.
    fn observe_channels(
        &self,
        filter: ChannelFilter,
    ) -> BoxStream<'static, AppResult<Vec<StoredChannel>>>;
}
