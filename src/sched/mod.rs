//! sched
//!
//! Background sync scheduling.
//!
//! [`Scheduler::start`] spawns a tokio task that runs a sync cycle at
//! a fixed interval. [`SchedulerHandle::stop`] shuts it down without
//! interrupting an in-flight cycle: the signal is only observed
//! between cycles, so whatever is mid-flight finishes (or fails and
//! restores) first.
//!
//! A failed tick is logged and retried at the next one; the vault lock
//! already keeps overlapping triggers out, so a tick that finds the
//! lock held simply skips.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::{run_cycle, SyncOutcome};
use crate::review::ReviewGateway;

/// How the scheduler drives sync cycles.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// The vault to sync.
    pub vault_dir: PathBuf,
    /// Time between cycles. Zero disables scheduling.
    pub interval: Duration,
}

impl SchedulerConfig {
    pub fn new(vault_dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            vault_dir: vault_dir.into(),
            interval,
        }
    }
}

/// Spawns and owns nothing; see [`Scheduler::start`].
pub struct Scheduler;

impl Scheduler {
    /// Spawn the background sync task.
    ///
    /// Returns `None` when the interval is zero (scheduling disabled
    /// by configuration). The first cycle runs one full interval after
    /// start, not immediately.
    pub fn start(
        config: SchedulerConfig,
        gateway: Option<ReviewGateway>,
    ) -> Option<SchedulerHandle> {
        if config.interval.is_zero() {
            tracing::info!("sync interval is zero; background syncing disabled");
            return None;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            // An interval's first tick completes immediately; consume
            // it so startup does not trigger a sync.
            ticker.tick().await;
            tracing::info!(
                interval_secs = config.interval.as_secs(),
                vault = %config.vault_dir.display(),
                "scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_once(&config.vault_dir, gateway.clone()).await;
                    }
                    changed = shutdown_rx.changed() => {
                        // A dropped handle reads as shutdown too.
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("scheduler stopped");
        });

        Some(SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        })
    }
}

async fn run_once(vault_dir: &Path, gateway: Option<ReviewGateway>) {
    tracing::debug!("scheduled sync tick");
    match run_cycle(vault_dir, gateway).await {
        Ok(SyncOutcome::Completed(report)) => {
            tracing::info!(
                session = %report.session.id,
                auto_merged = report.session.auto_merged.len(),
                deferred = report.session.deferred.len(),
                pushed = report.pushed,
                "scheduled sync finished"
            );
        }
        Ok(SyncOutcome::AlreadyRunning) => {
            tracing::debug!("previous sync still running; tick skipped");
        }
        Err(err) => {
            tracing::warn!(error = %err, "scheduled sync failed; retrying next tick");
        }
    }
}

/// Control handle for a running scheduler.
///
/// Dropping the handle stops the task the same way [`stop`] does,
/// minus the wait.
///
/// [`stop`]: SchedulerHandle::stop
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for its task to finish.
    ///
    /// An in-flight cycle completes before the task exits.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            if err.is_panic() {
                tracing::error!("scheduler task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_interval_disables_scheduling() {
        let config = SchedulerConfig::new("/nonexistent", Duration::ZERO);
        assert!(Scheduler::start(config, None).is_none());
    }

    #[tokio::test]
    async fn stop_before_first_tick_exits_promptly() {
        let config = SchedulerConfig::new("/nonexistent", Duration::from_secs(3600));
        let handle = Scheduler::start(config, None).unwrap();
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ticks_do_not_kill_the_task() {
        // Not a vault at all, so every cycle fails at open.
        let dir = tempfile::tempdir().unwrap();
        let config = SchedulerConfig::new(dir.path(), Duration::from_millis(50));
        let handle = Scheduler::start(config, None).unwrap();

        // Let several ticks fire.
        tokio::time::sleep(Duration::from_millis(300)).await;

        handle.stop().await;
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_task() {
        let config = SchedulerConfig::new("/nonexistent", Duration::from_secs(3600));
        let handle = Scheduler::start(config, None).unwrap();
        let task = handle.task;
        drop(handle.shutdown);
        // The task notices the dropped sender and exits on its own.
        task.await.unwrap();
    }
}
