//! Fetch, parse and atomically store one subscription's channels

use async_stream::stream;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::format::FormatDetector;
use super::interceptor::TracingInterceptor;
use super::state_manager::{StartRejection, SyncOutcome, SyncStateManager, SyncTrigger};
use crate::errors::{AppError, AppResult, ErrorKind};
use crate::models::{ChannelRecord, SyncState, SyncSummary};
use crate::repositories::ChannelStore;
use crate::sources::PlaylistFetcher;
use crate::utils::UrlUtils;

/// Runs subscription syncs.
///
/// Every sync stream yields one `Loading` followed by exactly one terminal
/// state. A `Success` is only yielded once the replacement has committed.
#[derive(Clone)]
pub struct SubscriptionSynchronizer {
    fetcher: Arc<dyn PlaylistFetcher>,
    store: Arc<dyn ChannelStore>,
    state_manager: SyncStateManager,
}

impl SubscriptionSynchronizer {
    pub fn new(
        fetcher: Arc<dyn PlaylistFetcher>,
        store: Arc<dyn ChannelStore>,
        state_manager: SyncStateManager,
    ) -> Self {
        Self {
            fetcher,
            store,
            state_manager,
        }
    }

    pub fn state_manager(&self) -> &SyncStateManager {
        &self.state_manager
    }

    pub fn store(&self) -> &Arc<dyn ChannelStore> {
        &self.store
    }

    pub fn sync(&self, title: &str, url: &str) -> BoxStream<'static, SyncState> {
        self.sync_with_options(title, url, SyncTrigger::Manual, CancellationToken::new())
    }

    pub fn sync_with_cancellation(
        &self,
        title: &str,
        url: &str,
        cancel: CancellationToken,
    ) -> BoxStream<'static, SyncState> {
        self.sync_with_options(title, url, SyncTrigger::Manual, cancel)
    }

    /// The stream does nothing until polled. Dropping it mid-flight releases
    /// the per-URL slot; an uncommitted replacement is rolled back.
    pub fn sync_with_options(
        &self,
        title: &str,
        url: &str,
        trigger: SyncTrigger,
        cancel: CancellationToken,
    ) -> BoxStream<'static, SyncState> {
        let synchronizer = self.clone();
        let title = title.to_string();
        let url = url.to_string();

        Box::pin(stream! {
            synchronizer.state_manager.publish(&url, SyncState::Loading);
            yield SyncState::Loading;

            let result = synchronizer.run(&title, &url, trigger, &cancel).await;
            yield terminal_state(&result);
        })
    }

    /// Run a sync to its terminal state without streaming it. Progress is
    /// still broadcast through the state manager.
    pub async fn sync_to_completion(
        &self,
        title: &str,
        url: &str,
        trigger: SyncTrigger,
        cancel: CancellationToken,
    ) -> AppResult<SyncSummary> {
        self.state_manager.publish(url, SyncState::Loading);
        self.run(title, url, trigger, &cancel).await
    }

    async fn run(
        &self,
        title: &str,
        url: &str,
        trigger: SyncTrigger,
        cancel: &CancellationToken,
    ) -> AppResult<SyncSummary> {
        let result = self.execute(title, url, trigger, cancel).await;
        if let Err(e) = &result {
            warn!(
                "Sync of '{}' ({}) failed: {}",
                title,
                UrlUtils::obfuscate_credentials(url),
                e
            );
        }
        self.state_manager.publish(url, terminal_state(&result));
        result
    }

    async fn execute(
        &self,
        title: &str,
        url: &str,
        trigger: SyncTrigger,
        cancel: &CancellationToken,
    ) -> AppResult<SyncSummary> {
        let display_url = UrlUtils::obfuscate_credentials(url);

        let guard = self
            .state_manager
            .try_start(url, trigger)
            .map_err(|rejection| match rejection {
                StartRejection::InProgress => AppError::operation_in_progress("sync", &display_url),
                StartRejection::BackingOff { retry_after } => AppError::BackingOff {
                    resource: display_url.clone(),
                    retry_after,
                },
            })?;

        let result = self.run_claimed(title, url, &display_url, cancel).await;
        guard.finish(match &result {
            Ok(_) => SyncOutcome::Succeeded,
            Err(e) if e.kind() == ErrorKind::Cancelled => SyncOutcome::Abandoned,
            Err(_) => SyncOutcome::Failed,
        });
        result
    }

    async fn run_claimed(
        &self,
        title: &str,
        url: &str,
        display_url: &str,
        cancel: &CancellationToken,
    ) -> AppResult<SyncSummary> {
        let kind = FormatDetector::require(url)?;

        if cancel.is_cancelled() {
            return Err(AppError::cancelled(display_url));
        }

        info!("Syncing subscription '{}' from {}", title, display_url);

        // The fetch runs detached; on cancellation its result is dropped
        let fetcher = self.fetcher.clone();
        let fetch_url = url.to_string();
        let fetch = tokio::spawn(async move { fetcher.fetch(&fetch_url).await });
        let content = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::cancelled(display_url)),
            joined = fetch => joined
                .map_err(|e| AppError::internal(format!("Fetch task failed: {e}")))??,
        };

        let label = display_url.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            let tracer = TracingInterceptor::new(label);
            kind.parse(&content, &[&tracer])
        })
        .await
        .map_err(|e| AppError::internal(format!("Parser task failed: {e}")))?;

        debug!(
            "Parsed {} channels from {} ({} discarded)",
            outcome.stats.records, display_url, outcome.stats.discarded
        );

        let records: Vec<ChannelRecord> = outcome
            .records
            .into_iter()
            .map(|record| record.with_subscription_url(url))
            .collect();

        if cancel.is_cancelled() {
            info!(
                "Sync of {} cancelled, discarding {} parsed channels",
                display_url,
                records.len()
            );
            return Err(AppError::cancelled(display_url));
        }

        let summary = self
            .store
            .replace_subscription_channels(title, url, &records)
            .await?;

        info!(
            "Synced subscription '{}': {} channels stored, {} replaced",
            title, summary.channels_saved, summary.channels_removed
        );
        Ok(summary)
    }
}

/// Format errors are reported bare, e.g. `Unsupported url: ...`
fn terminal_state(result: &AppResult<SyncSummary>) -> SyncState {
    match result {
        Ok(summary) => SyncState::Success(summary.clone()),
        Err(AppError::Format(format_error)) => SyncState::failure(format_error.to_string()),
        Err(other) => SyncState::failure(other.to_string()),
    }
}
