use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One playlist entry.
///
/// Records leaving the parser always carry a non-empty `title` and
/// `stream_url`; `subscription_url` is stamped by the synchronizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// External identifier, usually the EPG `tvg-id`
    pub id: String,
    /// Short name from `tvg-name`
    pub name: String,
    pub group: String,
    pub title: String,
    /// Logo URL from `tvg-logo`
    pub cover: String,
    pub stream_url: String,
    pub subscription_url: String,
}

impl ChannelRecord {
    pub fn with_subscription_url(mut self, subscription_url: impl Into<String>) -> Self {
        self.subscription_url = subscription_url.into();
        self
    }
}

/// A channel read back from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChannel {
    /// Storage row id, regenerated by every sync
    pub row_id: i64,
    /// Position of the entry in its playlist
    pub position: i64,
    #[serde(flatten)]
    pub record: ChannelRecord,
    pub favourite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub title: String,
    /// Identity of the subscription, never changes once stored
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favourite {
    pub stream_url: String,
    pub created_at: DateTime<Utc>,
}

/// Which channels a query or observation covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFilter {
    All,
    Subscription(String),
}

impl ChannelFilter {
    pub fn matches(&self, subscription_url: &str) -> bool {
        match self {
            ChannelFilter::All => true,
            ChannelFilter::Subscription(url) => url == subscription_url,
        }
    }
}

/// Outcome of a committed full replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub subscription_url: String,
    pub channels_saved: usize,
    pub channels_removed: usize,
}

/// Lifecycle of one sync call: one `Loading`, then exactly one terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SyncState {
    Loading,
    Success(SyncSummary),
    Failure { reason: String },
}

impl SyncState {
    pub fn failure(reason: impl Into<String>) -> Self {
        SyncState::Failure {
            reason: reason.into(),
        }
    }
}

/// A sync state change broadcast to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    pub subscription_url: String,
    pub state: SyncState,
    pub updated_at: DateTime<Utc>,
}
