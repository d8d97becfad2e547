use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schedule_notifier::api::router;
use schedule_notifier::config::AppConfig;
use schedule_notifier::db;
use schedule_notifier::notify::{FcmNotifier, NoopNotifier, Notifier};
use schedule_notifier::portal::{PortalScraper, TimetableSource};
use schedule_notifier::services::{ChangeMonitor, MonitorScheduler};
use schedule_notifier::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "schedule_notifier=debug,tower_http=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config.database_url).await?;

    let source: Arc<dyn TimetableSource> = Arc::new(PortalScraper::new(config.portal.clone()));
    let notifier: Arc<dyn Notifier> = match config.fcm.clone() {
        Some(fcm) => Arc::new(FcmNotifier::new(fcm)?),
        None => {
            warn!("FCM_PROJECT_ID / FCM_ACCESS_TOKEN not set, notifications are logged only");
            Arc::new(NoopNotifier)
        }
    };

    let monitor = Arc::new(ChangeMonitor::new(
        pool.clone(),
        source.clone(),
        notifier.clone(),
    ));
    let scheduler = MonitorScheduler::new(
        pool.clone(),
        monitor,
        config.check_interval,
        config.retention_days,
    );
    tokio::spawn(scheduler.start());

    let state = AppState {
        db: pool,
        source,
        notifier,
    };

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
