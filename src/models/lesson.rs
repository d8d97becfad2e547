use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SchoolDay {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl SchoolDay {
    /// Timetable column order.
    pub const ALL: [SchoolDay; 6] = [
        SchoolDay::Sunday,
        SchoolDay::Monday,
        SchoolDay::Tuesday,
        SchoolDay::Wednesday,
        SchoolDay::Thursday,
        SchoolDay::Friday,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lesson {
    pub day: SchoolDay,
    pub lesson_number: u32,
    pub subject: String,
    pub teacher: String,
    pub room: Option<String>,
    #[sqlx(rename = "group_info")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectTeachers {
    pub subject: String,
    pub teachers: Vec<String>,
}
