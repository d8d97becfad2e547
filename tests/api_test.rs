mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::{FakeSource, RecordingNotifier, change, lesson, setup_test_db};
use schedule_notifier::api::router;
use schedule_notifier::db::repository;
use schedule_notifier::models::{ChangeType, SchoolDay};
use schedule_notifier::state::AppState;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower::ServiceExt;

async fn test_app() -> (Router, Arc<FakeSource>, Arc<RecordingNotifier>) {
    let (app, _, source, notifier) = test_app_with(FakeSource::default()).await;
    (app, source, notifier)
}

async fn test_app_with(
    source: FakeSource,
) -> (Router, SqlitePool, Arc<FakeSource>, Arc<RecordingNotifier>) {
    let db = setup_test_db().await;
    let source = Arc::new(source);
    let notifier = Arc::new(RecordingNotifier {
        rejected: vec!["tok-dead".to_string()],
        ..RecordingNotifier::default()
    });
    let state = AppState {
        db: db.clone(),
        source: source.clone(),
        notifier: notifier.clone(),
    };
    (router(state), db, source, notifier)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (app, _, _) = test_app().await;

    let (status, body) = send(&app, "GET", "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_then_fetch_user() {
    let (app, _, _) = test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/register",
        Some(json!({
            "device_token": "tok-1",
            "class_id": "3895",
            "class_name": "יב' 4",
            "preferences": {"Math": "Jane Doe", "Art": ""},
            "language": "en"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["user_id"].as_i64().is_some());

    let (status, body) = send(&app, "GET", "/api/user/tok-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["class_id"], "3895");
    assert_eq!(body["user"]["language"], "en");
    assert_eq!(body["user"]["preferences"], json!({"Math": "Jane Doe"}));
}

#[tokio::test]
async fn test_register_missing_field_is_bad_request() {
    let (app, _, _) = test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/register",
        Some(json!({"device_token": "tok-1", "class_id": "3895"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing required field: class_name");
}

#[tokio::test]
async fn test_update_preferences_replaces_set() {
    let (app, _, _) = test_app().await;
    send(
        &app,
        "POST",
        "/api/register",
        Some(json!({
            "device_token": "tok-1",
            "class_id": "3895",
            "class_name": "יב' 4",
            "preferences": {"Math": "Jane Doe"}
        })),
    )
    .await;

    let (status, _) = send(
        &app,
        "PUT",
        "/api/preferences",
        Some(json!({
            "device_token": "tok-1",
            "preferences": {"Bible": "Rivka Cohen"},
            "language": "en"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/user/tok-1", None).await;
    assert_eq!(body["user"]["preferences"], json!({"Bible": "Rivka Cohen"}));
    assert_eq!(body["user"]["language"], "en");
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let (app, _, _) = test_app().await;

    let (status, body) = send(&app, "GET", "/api/user/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/preferences",
        Some(json!({"device_token": "nobody", "preferences": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_live_changes_bypass_history() {
    let (app, source, _) = test_app().await;
    source.set_changes("3895", vec![change("Jane Doe", ChangeType::Cancellation)]);

    let (status, body) = send(&app, "GET", "/api/changes/live/3895", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"][0]["teacher"], "Jane Doe");
    assert_eq!(body["changes"][0]["change_type"], "cancellation");

    // Live fetches never touch history.
    let (_, body) = send(&app, "GET", "/api/changes/3895", None).await;
    assert_eq!(body["changes"], json!([]));
}

#[tokio::test]
async fn test_notification_reports_dispatch_result() {
    let (app, _, notifier) = test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/test-notification",
        Some(json!({"device_token": "tok-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(notifier.sent()[0].1.title, "Test Notification");

    let (_, body) = send(
        &app,
        "POST",
        "/api/test-notification",
        Some(json!({"device_token": "tok-dead"})),
    )
    .await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_schedule_groups_subjects_and_refreshes_cache() {
    let (app, db, source, _) = test_app_with(FakeSource::default()).await;
    source.set_schedule(
        "3895",
        vec![
            lesson(SchoolDay::Sunday, 1, "Literature 30", "Yosef Mizrahi"),
            lesson(SchoolDay::Monday, 2, "Literature 70", "Sara Levi"),
        ],
    );

    let (status, body) = send(&app, "GET", "/api/schedule/3895", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["subjects"],
        json!([{"subject": "Literature", "teachers": ["Sara Levi", "Yosef Mizrahi"]}])
    );
    let cached = repository::cached_schedule(&db, "3895").await.expect("fetch cache");
    assert_eq!(cached.len(), 2);
}

#[tokio::test]
async fn test_schedule_served_from_cache_when_portal_down() {
    let (app, db, _, _) = test_app_with(FakeSource {
        failing: vec!["3895".to_string(), "3896".to_string()],
        ..FakeSource::default()
    })
    .await;
    repository::replace_schedule_cache(
        &db,
        "3895",
        &[lesson(SchoolDay::Tuesday, 4, "Bible", "Rivka Cohen")],
    )
    .await
    .expect("prime cache");

    let (status, body) = send(&app, "GET", "/api/schedule/3895", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subjects"][0]["teachers"], json!(["Rivka Cohen"]));

    // Nothing cached for this class, so the portal error surfaces.
    let (status, body) = send(&app, "GET", "/api/schedule/3896", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}
