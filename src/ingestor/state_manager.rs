use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{SyncProgress, SyncState};
use crate::utils::UrlUtils;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProcessingInfo {
    pub started_at: DateTime<Utc>,
    pub triggered_by: SyncTrigger,
    pub failure_count: u32,
    pub next_retry_after: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    Scheduler,
    Manual,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::Scheduler => write!(f, "scheduler"),
            SyncTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// How a claimed sync slot was released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Succeeded,
    Failed,
    /// Cancelled or dropped before reaching a result
    Abandoned,
}

/// Why [`SyncStateManager::try_start`] refused a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRejection {
    InProgress,
    BackingOff { retry_after: DateTime<Utc> },
}

/// Tracks in-flight syncs per subscription URL, failure backoff, and
/// broadcasts sync state changes.
#[derive(Clone)]
pub struct SyncStateManager {
    processing: Arc<Mutex<HashMap<String, ProcessingInfo>>>,
    progress_tx: broadcast::Sender<SyncProgress>,
}

impl SyncStateManager {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(256);
        Self {
            processing: Arc::new(Mutex::new(HashMap::new())),
            progress_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProcessingInfo>> {
        self.processing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the sync slot for `url`. Refused while another sync for the
    /// same URL is active, or while a scheduled sync is still backing off.
    pub fn try_start(&self, url: &str, trigger: SyncTrigger) -> Result<SyncGuard, StartRejection> {
        let mut processing = self.lock();
        let now = Utc::now();

        if let Some(existing) = processing.get(url) {
            if existing.active {
                return Err(StartRejection::InProgress);
            }
            if let Some(retry_after) = existing.next_retry_after {
                if trigger == SyncTrigger::Scheduler && now < retry_after {
                    return Err(StartRejection::BackingOff { retry_after });
                }
            }
        }

        let failure_count = processing.get(url).map(|i| i.failure_count).unwrap_or(0);
        processing.insert(
            url.to_string(),
            ProcessingInfo {
                started_at: now,
                triggered_by: trigger,
                failure_count,
                next_retry_after: None,
                active: true,
            },
        );

        Ok(SyncGuard {
            manager: self.clone(),
            url: url.to_string(),
            outcome: SyncOutcome::Abandoned,
        })
    }

    fn release(&self, url: &str, outcome: SyncOutcome) {
        let mut processing = self.lock();
        let Some(mut info) = processing.remove(url) else {
            return;
        };

        match outcome {
            SyncOutcome::Succeeded => {}
            SyncOutcome::Failed => {
                info.failure_count += 1;
                let backoff_seconds = Self::calculate_backoff_with_jitter(info.failure_count);
                info.next_retry_after = Some(Utc::now() + Duration::seconds(backoff_seconds as i64));
                info.active = false;
                debug!(
                    "Sync for {} failed {} time(s), next scheduled attempt after {}s",
                    UrlUtils::obfuscate_credentials(url),
                    info.failure_count,
                    backoff_seconds
                );
                processing.insert(url.to_string(), info);
            }
            SyncOutcome::Abandoned => {
                if info.failure_count > 0 {
                    info.active = false;
                    processing.insert(url.to_string(), info);
                }
            }
        }
    }

    /// Exponential backoff capped at one hour, plus up to 25% jitter
    fn calculate_backoff_with_jitter(failure_count: u32) -> u64 {
        let base_delay = 2_u64.pow(failure_count.min(12));
        let capped_delay = base_delay.min(3600);
        let jitter = fastrand::u64(0..=capped_delay / 4);
        capped_delay + jitter
    }

    pub fn is_syncing(&self, url: &str) -> bool {
        self.lock().get(url).is_some_and(|info| info.active)
    }

    pub fn is_in_backoff(&self, url: &str) -> bool {
        let now = Utc::now();
        self.lock()
            .get(url)
            .and_then(|info| info.next_retry_after)
            .is_some_and(|retry| now < retry)
    }

    pub fn get_processing_info(&self, url: &str) -> Option<ProcessingInfo> {
        self.lock().get(url).cloned()
    }

    pub fn active_syncs(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, info)| info.active)
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    /// Broadcast a state change to progress subscribers.
    pub fn publish(&self, url: &str, state: SyncState) {
        let _ = self.progress_tx.send(SyncProgress {
            subscription_url: url.to_string(),
            state,
            updated_at: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncProgress> {
        self.progress_tx.subscribe()
    }
}

impl Default for SyncStateManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive claim on one subscription URL; released on drop.
pub struct SyncGuard {
    manager: SyncStateManager,
    url: String,
    outcome: SyncOutcome,
}

impl SyncGuard {
    pub fn finish(mut self, outcome: SyncOutcome) {
        self.outcome = outcome;
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.manager.release(&self.url, self.outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://example.com/list.m3u";

    #[test]
    fn test_second_claim_is_rejected_while_active() {
        let manager = SyncStateManager::new();
        let guard = manager.try_start(URL, SyncTrigger::Manual).unwrap();

        assert!(manager.is_syncing(URL));
        assert_eq!(
            manager.try_start(URL, SyncTrigger::Manual).err(),
            Some(StartRejection::InProgress)
        );
        assert!(manager
            .try_start("http://example.com/other.m3u", SyncTrigger::Manual)
            .is_ok());

        guard.finish(SyncOutcome::Succeeded);
        assert!(!manager.is_syncing(URL));
        assert!(manager.get_processing_info(URL).is_none());
    }

    #[test]
    fn test_dropped_guard_releases_slot() {
        let manager = SyncStateManager::new();
        {
            let _guard = manager.try_start(URL, SyncTrigger::Manual).unwrap();
            assert_eq!(manager.active_syncs(), vec![URL.to_string()]);
        }
        assert!(manager.active_syncs().is_empty());
        assert!(manager.try_start(URL, SyncTrigger::Manual).is_ok());
    }

    #[test]
    fn test_failure_backoff_applies_to_scheduler_only() {
        let manager = SyncStateManager::new();
        manager
            .try_start(URL, SyncTrigger::Scheduler)
            .unwrap()
            .finish(SyncOutcome::Failed);

        assert!(manager.is_in_backoff(URL));
        let info = manager.get_processing_info(URL).unwrap();
        assert_eq!(info.failure_count, 1);
        assert!(!info.active);

        assert!(matches!(
            manager.try_start(URL, SyncTrigger::Scheduler).err(),
            Some(StartRejection::BackingOff { .. })
        ));
        let guard = manager.try_start(URL, SyncTrigger::Manual).unwrap();
        guard.finish(SyncOutcome::Succeeded);
        assert!(!manager.is_in_backoff(URL));
    }

    #[test]
    fn test_backoff_is_capped() {
        let expected_base = [
            (1, 2),
            (5, 32),
            (10, 1024),
            (11, 2048),
            (12, 3600),
            (30, 3600),
        ];
        for (failures, base) in expected_base {
            let delay = SyncStateManager::calculate_backoff_with_jitter(failures);
            assert!(
                delay >= base && delay <= base + base / 4,
                "{failures} failures gave {delay}s"
            );
        }
    }

    #[test]
    fn test_progress_is_broadcast() {
        let manager = SyncStateManager::new();
        let mut rx = manager.subscribe();

        manager.publish(URL, SyncState::Loading);
        manager.publish(URL, SyncState::failure("boom"));

        let (first, second) = tokio_test::block_on(async {
            (rx.recv().await.unwrap(), rx.recv().await.unwrap())
        });
        assert_eq!(first.subscription_url, URL);
        assert_eq!(first.state, SyncState::Loading);
        assert_eq!(second.state, SyncState::failure("boom"));
    }
}
