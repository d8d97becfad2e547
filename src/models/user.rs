use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Language {
    #[default]
    He,
    En,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub device_token: String,
    pub class_id: String,
    pub class_name: String,
    pub language: Language,
    pub created_at: String,
    pub updated_at: String,
}

/// subject -> teacher name
pub type TeacherPreferences = BTreeMap<String, String>;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub device_token: Option<String>,
    pub class_id: Option<String>,
    pub class_name: Option<String>,
    pub preferences: Option<TeacherPreferences>,
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub device_token: Option<String>,
    pub preferences: Option<TeacherPreferences>,
    pub language: Option<Language>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestNotificationRequest {
    pub device_token: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
}
