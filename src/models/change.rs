use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ChangeType {
    Cancellation,
    RoomChange,
    Other,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Cancellation => "cancellation",
            ChangeType::RoomChange => "room_change",
            ChangeType::Other => "other",
        }
    }
}

/// A change as scraped from the portal's changes view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub date: String,
    pub lesson_number: u32,
    pub teacher: String,
    pub change_type: ChangeType,
    pub description: String,
    pub new_room: Option<String>,
}

/// A row of the change log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredChange {
    pub id: i64,
    pub class_id: String,
    pub date: String,
    pub lesson_number: u32,
    pub teacher: String,
    pub change_type: ChangeType,
    pub description: String,
    pub new_room: Option<String>,
    pub detected_at: String,
    pub notified: bool,
}

/// Result of inserting into the change log under its natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate,
}

impl InsertOutcome {
    pub fn is_new(self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}
