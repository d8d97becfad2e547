use std::collections::BTreeMap;

use crate::models::{Change, ChangeType, Language};

/// A push notification ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Notification for a newly detected change, in the recipient's language.
    pub fn for_change(change: &Change, language: Language) -> Self {
        let n = change.lesson_number;
        let teacher = &change.teacher;
        let date = &change.date;

        let (title, body) = match (change.change_type, language) {
            (ChangeType::Cancellation, Language::He) => (
                "ביטול שיעור".to_string(),
                format!("שיעור {} - {} בוטל ב-{}", n, teacher, date),
            ),
            (ChangeType::Cancellation, Language::En) => (
                "Class Cancelled".to_string(),
                format!("Lesson {} - {} cancelled on {}", n, teacher, date),
            ),
            (ChangeType::RoomChange, Language::He) => (
                "שינוי חדר".to_string(),
                format!(
                    "שיעור {} - {} עבר לחדר {} ב-{}",
                    n,
                    teacher,
                    change.new_room.as_deref().unwrap_or("לא ידוע"),
                    date
                ),
            ),
            (ChangeType::RoomChange, Language::En) => (
                "Room Change".to_string(),
                format!(
                    "Lesson {} - {} moved to room {} on {}",
                    n,
                    teacher,
                    change.new_room.as_deref().unwrap_or("Unknown"),
                    date
                ),
            ),
            (ChangeType::Other, Language::He) => (
                "שינוי במערכת".to_string(),
                format!("שיעור {} - {}: {}", n, teacher, change.description),
            ),
            (ChangeType::Other, Language::En) => (
                "Schedule Change".to_string(),
                format!("Lesson {} - {}: {}", n, teacher, change.description),
            ),
        };

        PushMessage::new(title, body)
            .with_data("change_type", change.change_type.as_str())
            .with_data("lesson_number", n.to_string())
            .with_data("teacher", teacher.clone())
            .with_data("date", date.clone())
    }
}
