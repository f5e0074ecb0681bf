use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::state_manager::SyncTrigger;
use super::subscription_sync::SubscriptionSynchronizer;
use crate::config::SyncConfig;
use crate::errors::{AppError, AppResult};
use crate::models::Subscription;
use crate::utils::UrlUtils;

/// When a subscription is due for another sync
#[derive(Debug, Clone)]
pub struct SyncSchedule {
    schedule: Schedule,
    run_missed_immediately: bool,
}

impl SyncSchedule {
    pub fn new(update_cron: &str, run_missed_immediately: bool) -> AppResult<Self> {
        let schedule = Schedule::from_str(update_cron).map_err(|e| {
            AppError::configuration(format!("Invalid cron expression '{update_cron}': {e}"))
        })?;
        Ok(Self {
            schedule,
            run_missed_immediately,
        })
    }

    /// Due once the first fire time after the last sync has passed. A
    /// never-synced subscription is due right away when missed runs are
    /// caught up, otherwise at the first fire time after it was created.
    pub fn is_due(&self, subscription: &Subscription, now: DateTime<Utc>) -> bool {
        let reference = match subscription.last_synced_at {
            Some(last_synced) => last_synced,
            None if self.run_missed_immediately => return true,
            None => subscription.created_at,
        };

        self.schedule
            .after(&reference)
            .next()
            .is_some_and(|fire_time| fire_time <= now)
    }

    pub fn next_run(&self, subscription: &Subscription) -> Option<DateTime<Utc>> {
        let reference = subscription
            .last_synced_at
            .unwrap_or(subscription.created_at);
        self.schedule.after(&reference).next()
    }
}

/// Periodically re-syncs stored subscriptions.
pub struct SyncScheduler {
    synchronizer: SubscriptionSynchronizer,
    schedule: SyncSchedule,
    tick: std::time::Duration,
}

impl SyncScheduler {
    pub fn new(synchronizer: SubscriptionSynchronizer, config: &SyncConfig) -> AppResult<Self> {
        Ok(Self {
            synchronizer,
            schedule: SyncSchedule::new(&config.update_cron, config.run_missed_immediately)?,
            tick: config.scheduler_tick(),
        })
    }

    /// Tick until `shutdown` is cancelled. In-flight syncs see the same token.
    pub async fn start(self, shutdown: CancellationToken) -> AppResult<()> {
        info!("Starting sync scheduler (tick every {:?})", self.tick);
        self.log_startup_schedule().await;

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sync scheduler stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    trace!("Scheduler tick - checking subscriptions");
                    if let Err(e) = self.run_due(&shutdown).await {
                        error!("Error checking subscriptions: {}", e);
                    }
                }
            }
        }
    }

    /// Sync every due subscription once, one after another. Returns how many
    /// syncs succeeded.
    pub async fn run_due(&self, shutdown: &CancellationToken) -> AppResult<usize> {
        let now = Utc::now();
        let state_manager = self.synchronizer.state_manager();
        let subscriptions = self.synchronizer.store().list_subscriptions().await?;

        let mut succeeded = 0;
        for subscription in subscriptions {
            if shutdown.is_cancelled() {
                break;
            }
            if !self.schedule.is_due(&subscription, now) {
                continue;
            }

            let display_url = UrlUtils::obfuscate_credentials(&subscription.url);
            if state_manager.is_syncing(&subscription.url) {
                debug!("Skipping {}: sync already running", display_url);
                continue;
            }
            if state_manager.is_in_backoff(&subscription.url) {
                debug!("Skipping {}: in retry backoff", display_url);
                continue;
            }

            info!("Scheduled sync of '{}' ({})", subscription.title, display_url);
            match self
                .synchronizer
                .sync_to_completion(
                    &subscription.title,
                    &subscription.url,
                    SyncTrigger::Scheduler,
                    shutdown.child_token(),
                )
                .await
            {
                Ok(_) => succeeded += 1,
                Err(e) => warn!("Scheduled sync of {} failed: {}", display_url, e),
            }
        }

        Ok(succeeded)
    }

    async fn log_startup_schedule(&self) {
        let subscriptions = match self.synchronizer.store().list_subscriptions().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!("Failed to load subscriptions: {}", e);
                return;
            }
        };

        for subscription in &subscriptions {
            match self.schedule.next_run(subscription) {
                Some(next_time) => info!(
                    "Subscription '{}' - next scheduled sync: {}",
                    subscription.title,
                    next_time.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => warn!(
                    "Subscription '{}' has no upcoming scheduled sync",
                    subscription.title
                ),
            }
        }
    }
}
