use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::{Router, routing::get};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::notify::PushMessage;
use crate::portal;
use crate::state::AppState;

const RECENT_CHANGES_LIMIT: u32 = 50;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/classes", get(list_classes))
        .route("/api/schedule/{class_id}", get(class_subjects))
        .route("/api/register", post(register_user))
        .route("/api/preferences", put(update_preferences))
        .route("/api/user/{device_token}", get(get_user))
        .route("/api/changes/{class_id}", get(recent_changes))
        .route("/api/changes/live/{class_id}", get(live_changes))
        .route("/api/test-notification", post(test_notification))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

impl MessageResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    status: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
struct ClassEntry {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct ClassesResponse {
    success: bool,
    classes: Vec<ClassEntry>,
}

#[derive(Serialize)]
struct SubjectsResponse {
    success: bool,
    subjects: Vec<SubjectTeachers>,
}

#[derive(Serialize)]
struct RegisterResponse {
    success: bool,
    user_id: i64,
    message: String,
}

#[derive(Serialize)]
struct UserProfile {
    class_id: String,
    class_name: String,
    language: Language,
    preferences: TeacherPreferences,
}

#[derive(Serialize)]
struct UserResponse {
    success: bool,
    user: UserProfile,
}

#[derive(Serialize)]
struct StoredChangesResponse {
    success: bool,
    changes: Vec<StoredChange>,
}

#[derive(Serialize)]
struct LiveChangesResponse {
    success: bool,
    changes: Vec<Change>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("Missing required field: {}", field)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(Json(HealthResponse {
        success: true,
        status: "ok",
        message: "Schedule Notifier API is running",
    }))
}

async fn list_classes(State(state): State<AppState>) -> Result<Json<ClassesResponse>, AppError> {
    let classes = state
        .source
        .list_classes()
        .await?
        .into_iter()
        .map(|(name, id)| ClassEntry { id, name })
        .collect();
    Ok(Json(ClassesResponse {
        success: true,
        classes,
    }))
}

async fn class_subjects(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<SubjectsResponse>, AppError> {
    let lessons = match state.source.fetch_schedule(&class_id).await {
        Ok(lessons) => {
            if let Err(e) = repository::replace_schedule_cache(&state.db, &class_id, &lessons).await
            {
                warn!("failed to cache schedule for class {}: {}", class_id, e);
            }
            lessons
        }
        // Portal unreachable: fall back to the last snapshot if there is one.
        Err(e) if e.is_network() => {
            let cached = repository::cached_schedule(&state.db, &class_id).await?;
            if cached.is_empty() {
                return Err(e);
            }
            warn!("serving cached schedule for class {}: {}", class_id, e);
            cached
        }
        Err(e) => return Err(e),
    };

    let subjects = portal::group_subjects(&lessons)
        .into_iter()
        .map(|(subject, teachers)| SubjectTeachers { subject, teachers })
        .collect();
    Ok(Json(SubjectsResponse {
        success: true,
        subjects,
    }))
}

async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, AppError> {
    let req = body(payload)?;
    let device_token = required(req.device_token, "device_token")?;
    let class_id = required(req.class_id, "class_id")?;
    let class_name = required(req.class_name, "class_name")?;
    let preferences = required(req.preferences, "preferences")?;

    let user_id = repository::upsert_user(
        &state.db,
        &device_token,
        &class_id,
        &class_name,
        req.language.unwrap_or_default(),
    )
    .await?;
    repository::set_teacher_preferences(&state.db, user_id, &preferences).await?;

    Ok(Json(RegisterResponse {
        success: true,
        user_id,
        message: "User registered successfully".to_string(),
    }))
}

async fn update_preferences(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePreferencesRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = body(payload)?;
    let device_token = required(req.device_token, "device_token")?;
    let preferences = required(req.preferences, "preferences")?;

    let user = repository::get_user_by_token(&state.db, &device_token)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    repository::set_teacher_preferences(&state.db, user.id, &preferences).await?;
    if let Some(language) = req.language {
        repository::upsert_user(
            &state.db,
            &device_token,
            &user.class_id,
            &user.class_name,
            language,
        )
        .await?;
    }

    Ok(MessageResponse::ok("Preferences updated successfully"))
}

async fn get_user(
    State(state): State<AppState>,
    Path(device_token): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = repository::get_user_by_token(&state.db, &device_token)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let preferences = repository::get_teacher_preferences(&state.db, user.id).await?;

    Ok(Json(UserResponse {
        success: true,
        user: UserProfile {
            class_id: user.class_id,
            class_name: user.class_name,
            language: user.language,
            preferences,
        },
    }))
}

async fn recent_changes(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<StoredChangesResponse>, AppError> {
    let changes = repository::recent_changes(&state.db, &class_id, RECENT_CHANGES_LIMIT).await?;
    Ok(Json(StoredChangesResponse {
        success: true,
        changes,
    }))
}

async fn live_changes(
    State(state): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<LiveChangesResponse>, AppError> {
    let changes = state.source.fetch_changes(&class_id).await?;
    Ok(Json(LiveChangesResponse {
        success: true,
        changes,
    }))
}

async fn test_notification(
    State(state): State<AppState>,
    payload: Result<Json<TestNotificationRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = body(payload)?;
    let device_token = required(req.device_token, "device_token")?;

    let message = PushMessage::new(
        req.title.unwrap_or_else(|| "Test Notification".to_string()),
        req.body
            .unwrap_or_else(|| "This is a test notification from Schedule Notifier".to_string()),
    )
    .with_data("test", "true");

    let response = match state.notifier.send_to_one(&device_token, &message).await {
        Ok(()) => MessageResponse {
            success: true,
            message: "Test notification sent".to_string(),
        },
        Err(e) => {
            warn!("test notification failed: {}", e);
            MessageResponse {
                success: false,
                message: "Failed to send notification".to_string(),
            }
        }
    };
    Ok(Json(response))
}
