use chrono::{Duration, SecondsFormat, Utc};
use sqlx::SqlitePool;

use crate::models::{
    Change, InsertOutcome, Language, Lesson, StoredChange, TeacherPreferences, User,
};

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

const USER_COLUMNS: &str =
    "u.id, u.device_token, u.class_id, u.class_name, u.language, u.created_at, u.updated_at";

const CHANGE_COLUMNS: &str = "id, class_id, date, lesson_number, teacher, change_type, \
     description, new_room, detected_at, notified";

/// Insert or re-register a device. Class membership and language are overwritten.
pub async fn upsert_user(
    db: &SqlitePool,
    device_token: &str,
    class_id: &str,
    class_name: &str,
    language: Language,
) -> Result<i64, sqlx::Error> {
    let now = now();
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (device_token, class_id, class_name, language, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        ON CONFLICT(device_token) DO UPDATE SET
            class_id = excluded.class_id,
            class_name = excluded.class_name,
            language = excluded.language,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(device_token)
    .bind(class_id)
    .bind(class_name)
    .bind(language)
    .bind(&now)
    .fetch_one(db)
    .await?;

    Ok(id)
}

pub async fn get_user_by_token(
    db: &SqlitePool,
    device_token: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users u WHERE u.device_token = ?",
        USER_COLUMNS
    ))
    .bind(device_token)
    .fetch_optional(db)
    .await
}

/// Replace the user's whole preference set. Subjects with an empty teacher are skipped.
pub async fn set_teacher_preferences(
    db: &SqlitePool,
    user_id: i64,
    preferences: &TeacherPreferences,
) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM teacher_preferences WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    for (subject, teacher) in preferences {
        let teacher = teacher.trim();
        if teacher.is_empty() {
            continue;
        }
        sqlx::query(
            "INSERT INTO teacher_preferences (user_id, subject, teacher_name) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(subject)
        .bind(teacher)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn get_teacher_preferences(
    db: &SqlitePool,
    user_id: i64,
) -> Result<TeacherPreferences, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT subject, teacher_name FROM teacher_preferences WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Users of a class with the teacher among their preferences, whatever the subject.
pub async fn list_users_by_class_and_teacher(
    db: &SqlitePool,
    class_id: &str,
    teacher_name: &str,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT DISTINCT {}
        FROM users u
        JOIN teacher_preferences tp ON u.id = tp.user_id
        WHERE u.class_id = ? AND tp.teacher_name = ?
        ORDER BY u.id
        "#,
        USER_COLUMNS
    ))
    .bind(class_id)
    .bind(teacher_name)
    .fetch_all(db)
    .await
}

pub async fn list_distinct_registered_classes(db: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT class_id FROM users ORDER BY class_id")
        .fetch_all(db)
        .await
}

/// Insert under the natural key (class, date, lesson, teacher, type).
/// A second sighting of the same key is `Duplicate` even if the description changed.
pub async fn insert_change_if_absent(
    db: &SqlitePool,
    class_id: &str,
    change: &Change,
) -> Result<InsertOutcome, sqlx::Error> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO changes_history
            (class_id, date, lesson_number, teacher, change_type, description, new_room,
            detected_at, notified)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)
        ON CONFLICT(class_id, date, lesson_number, teacher, change_type) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(class_id)
    .bind(&change.date)
    .bind(change.lesson_number)
    .bind(&change.teacher)
    .bind(change.change_type)
    .bind(&change.description)
    .bind(&change.new_room)
    .bind(now())
    .fetch_optional(db)
    .await?;

    Ok(match inserted {
        Some(id) => InsertOutcome::Inserted(id),
        None => InsertOutcome::Duplicate,
    })
}

pub async fn mark_change_notified(db: &SqlitePool, change_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE changes_history SET notified = 1 WHERE id = ?")
        .bind(change_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn recent_changes(
    db: &SqlitePool,
    class_id: &str,
    limit: u32,
) -> Result<Vec<StoredChange>, sqlx::Error> {
    sqlx::query_as::<_, StoredChange>(&format!(
        "SELECT {} FROM changes_history WHERE class_id = ? \
         ORDER BY detected_at DESC, id DESC LIMIT ?",
        CHANGE_COLUMNS
    ))
    .bind(class_id)
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn unnotified_changes(
    db: &SqlitePool,
    class_id: &str,
) -> Result<Vec<StoredChange>, sqlx::Error> {
    sqlx::query_as::<_, StoredChange>(&format!(
        "SELECT {} FROM changes_history WHERE class_id = ? AND notified = 0 \
         ORDER BY detected_at DESC, id DESC",
        CHANGE_COLUMNS
    ))
    .bind(class_id)
    .fetch_all(db)
    .await
}

/// Delete change log rows first seen more than `days` days ago.
pub async fn prune_changes_older_than(db: &SqlitePool, days: u32) -> Result<u64, sqlx::Error> {
    let cutoff = (Utc::now() - Duration::days(i64::from(days)))
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    let result = sqlx::query("DELETE FROM changes_history WHERE detected_at < ?")
        .bind(cutoff)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result)
}

/// Swap the cached snapshot of a class's timetable for `lessons`.
pub async fn replace_schedule_cache(
    db: &SqlitePool,
    class_id: &str,
    lessons: &[Lesson],
) -> Result<(), sqlx::Error> {
    let now = now();
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM schedule_cache WHERE class_id = ?")
        .bind(class_id)
        .execute(&mut *tx)
        .await?;

    for lesson in lessons {
        sqlx::query(
            r#"
            INSERT INTO schedule_cache
                (class_id, day, lesson_number, subject, teacher, room, group_info, cached_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(class_id)
        .bind(lesson.day)
        .bind(lesson.lesson_number)
        .bind(&lesson.subject)
        .bind(&lesson.teacher)
        .bind(&lesson.room)
        .bind(&lesson.group)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn cached_schedule(db: &SqlitePool, class_id: &str) -> Result<Vec<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(
        r#"
        SELECT day, lesson_number, subject, teacher, room, group_info
        FROM schedule_cache
        WHERE class_id = ?
        ORDER BY id
        "#,
    )
    .bind(class_id)
    .fetch_all(db)
    .await
}
