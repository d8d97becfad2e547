use std::sync::Arc;

use sqlx::SqlitePool;

use crate::notify::Notifier;
use crate::portal::TimetableSource;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub source: Arc<dyn TimetableSource>,
    pub notifier: Arc<dyn Notifier>,
}
