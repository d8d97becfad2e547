use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::db::repository;
use crate::services::monitor::{ChangeMonitor, CycleOutcome};

/// Runs the change check at startup and then on a fixed interval.
pub struct MonitorScheduler {
    db: SqlitePool,
    monitor: Arc<ChangeMonitor>,
    interval: Duration,
    retention_days: u32,
}

impl MonitorScheduler {
    pub fn new(
        db: SqlitePool,
        monitor: Arc<ChangeMonitor>,
        interval: Duration,
        retention_days: u32,
    ) -> Self {
        Self {
            db,
            monitor,
            interval,
            retention_days,
        }
    }

    /// Never returns; errors are logged and the next tick retries.
    pub async fn start(self) {
        info!("Starting change monitor (interval: {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // The first tick fires immediately.
            ticker.tick().await;
            self.run_once().await;
        }
    }

    pub async fn run_once(&self) {
        match self.monitor.check_all_classes().await {
            Ok(CycleOutcome::Completed(stats)) => {
                info!(
                    "Scheduled check done - {} classes ({} failed), {} new changes, {} sent",
                    stats.classes_checked,
                    stats.classes_failed,
                    stats.new_changes,
                    stats.notifications_sent
                );
            }
            Ok(CycleOutcome::Skipped) => {}
            Err(e) => warn!("Scheduled check failed: {:?}", e),
        }

        match repository::prune_changes_older_than(&self.db, self.retention_days).await {
            Ok(0) => {}
            Ok(removed) => info!(
                "Pruned {} changes older than {} days",
                removed, self.retention_days
            ),
            Err(e) => warn!("Retention sweep failed: {}", e),
        }
    }
}
