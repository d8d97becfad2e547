#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use schedule_notifier::error::AppError;
use schedule_notifier::models::{Change, ChangeType, Lesson, SchoolDay};
use schedule_notifier::notify::{Notifier, PushMessage};
use schedule_notifier::portal::TimetableSource;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn change(teacher: &str, change_type: ChangeType) -> Change {
    Change {
        date: "15.01.2026".to_string(),
        lesson_number: 8,
        teacher: teacher.to_string(),
        change_type,
        description: "cancellation of lesson".to_string(),
        new_room: None,
    }
}

/// Serves canned data per class; classes listed in `failing` return a network-class error.
#[derive(Default)]
pub struct FakeSource {
    pub changes: Mutex<HashMap<String, Vec<Change>>>,
    pub schedules: Mutex<HashMap<String, Vec<Lesson>>>,
    pub failing: Vec<String>,
}

impl FakeSource {
    pub fn set_schedule(&self, class_id: &str, lessons: Vec<Lesson>) {
        self.schedules
            .lock()
            .expect("lock")
            .insert(class_id.to_string(), lessons);
    }

    fn check_reachable(&self, class_id: &str) -> Result<(), AppError> {
        if self.failing.iter().any(|c| c == class_id) {
            return Err(AppError::UpstreamStatus {
                status: 503,
                url: "http://portal.test".to_string(),
            });
        }
        Ok(())
    }

    pub fn set_changes(&self, class_id: &str, changes: Vec<Change>) {
        self.changes
            .lock()
            .expect("lock")
            .insert(class_id.to_string(), changes);
    }
}

#[async_trait]
impl TimetableSource for FakeSource {
    async fn list_classes(&self) -> Result<BTreeMap<String, String>, AppError> {
        Ok(BTreeMap::new())
    }

    async fn fetch_schedule(&self, class_id: &str) -> Result<Vec<Lesson>, AppError> {
        self.check_reachable(class_id)?;
        Ok(self
            .schedules
            .lock()
            .expect("lock")
            .get(class_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_changes(&self, class_id: &str) -> Result<Vec<Change>, AppError> {
        self.check_reachable(class_id)?;
        Ok(self
            .changes
            .lock()
            .expect("lock")
            .get(class_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Records every dispatch; tokens listed in `rejected` fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, PushMessage)>>,
    pub rejected: Vec<String>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, PushMessage)> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_to_one(&self, token: &str, message: &PushMessage) -> Result<(), AppError> {
        if self.rejected.iter().any(|t| t == token) {
            return Err(AppError::Notification("token rejected".to_string()));
        }
        self.sent
            .lock()
            .expect("lock")
            .push((token.to_string(), message.clone()));
        Ok(())
    }
}

pub fn lesson(day: SchoolDay, lesson_number: u32, subject: &str, teacher: &str) -> Lesson {
    Lesson {
        day,
        lesson_number,
        subject: subject.to_string(),
        teacher: teacher.to_string(),
        room: None,
        group: None,
    }
}
