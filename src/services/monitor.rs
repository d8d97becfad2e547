use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{Change, InsertOutcome, User};
use crate::notify::{Notifier, PushMessage};
use crate::portal::TimetableSource;

/// Pulls live changes for every tracked class and notifies subscribers of new ones.
pub struct ChangeMonitor {
    db: SqlitePool,
    source: Arc<dyn TimetableSource>,
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<()>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    pub changes_seen: usize,
    pub new_changes: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub classes_checked: usize,
    pub classes_failed: usize,
    pub changes_seen: usize,
    pub new_changes: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

impl CycleStats {
    fn absorb(&mut self, class: &ClassStats) {
        self.changes_seen += class.changes_seen;
        self.new_changes += class.new_changes;
        self.notifications_sent += class.notifications_sent;
        self.notifications_failed += class.notifications_failed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleStats),
    /// Another cycle was still running.
    Skipped,
}

impl ChangeMonitor {
    pub fn new(
        db: SqlitePool,
        source: Arc<dyn TimetableSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            source,
            notifier,
            in_flight: Mutex::new(()),
        }
    }

    /// One pass over every class with at least one registered user.
    ///
    /// A class that fails is logged and skipped; only failing to list the classes is an error.
    pub async fn check_all_classes(&self) -> Result<CycleOutcome, AppError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("change check already running, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let classes = repository::list_distinct_registered_classes(&self.db).await?;
        info!("Checking {} classes", classes.len());

        let mut stats = CycleStats::default();
        for class_id in classes {
            stats.classes_checked += 1;
            match self.check_class(&class_id).await {
                Ok(class_stats) => stats.absorb(&class_stats),
                Err(e) => {
                    stats.classes_failed += 1;
                    warn!("Error checking changes for class {}: {}", class_id, e);
                }
            }
        }

        info!("Change check completed: {:?}", stats);
        Ok(CycleOutcome::Completed(stats))
    }

    pub async fn check_class(&self, class_id: &str) -> Result<ClassStats, AppError> {
        info!("Checking changes for class {}", class_id);
        let changes = self.source.fetch_changes(class_id).await?;

        let mut stats = ClassStats {
            changes_seen: changes.len(),
            ..ClassStats::default()
        };

        for change in changes {
            // Resolve recipients before recording the change; a failed lookup leaves no row.
            let users =
                repository::list_users_by_class_and_teacher(&self.db, class_id, &change.teacher)
                    .await?;
            let InsertOutcome::Inserted(change_id) =
                repository::insert_change_if_absent(&self.db, class_id, &change).await?
            else {
                continue;
            };
            stats.new_changes += 1;
            info!(
                "New change detected in class {}: {} - {}",
                class_id,
                change.teacher,
                change.change_type.as_str()
            );

            let (sent, failed) = self.notify_subscribers(&users, &change).await;
            stats.notifications_sent += sent;
            stats.notifications_failed += failed;

            if let Err(e) = repository::mark_change_notified(&self.db, change_id).await {
                error!("Failed to mark change {} as notified: {}", change_id, e);
            }
        }

        Ok(stats)
    }

    async fn notify_subscribers(&self, users: &[User], change: &Change) -> (usize, usize) {
        let mut sent = 0;
        let mut failed = 0;
        for user in users {
            let message = PushMessage::for_change(change, user.language);
            match self.notifier.send_to_one(&user.device_token, &message).await {
                Ok(()) => {
                    sent += 1;
                    info!("Notification sent to user {}", user.id);
                }
                Err(e) => {
                    failed += 1;
                    warn!("Failed to send notification to user {}: {}", user.id, e);
                }
            }
        }
        (sent, failed)
    }
}
