use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_PORTAL_URL: &str =
    "https://beginhs.iscool.co.il/Default.aspx?TabId=4645&language=he-IL";

/// Postback targets and endpoint of the timetable portal.
#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub base_url: String,
    pub class_list_control: String,
    pub timetable_button: String,
    pub changes_button: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PORTAL_URL.to_string(),
            class_list_control: "dnn$ctr16506$TimeTableView$ClassesList".to_string(),
            timetable_button: "dnn$ctr16506$TimeTableView$btnTimeTable".to_string(),
            changes_button: "dnn$ctr16506$TimeTableView$btnChanges".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FcmConfig {
    pub project_id: String,
    pub access_token: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub check_interval: Duration,
    pub retention_days: u32,
    pub portal: PortalConfig,
    pub fcm: Option<FcmConfig>,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; unset variables take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://schedule_notifier.db?mode=rwc".to_string());
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var(&lookup, "PORT", 5000u16)?;
        let interval_minutes = parse_var(&lookup, "CHECK_INTERVAL_MINUTES", 20u64)?;
        if interval_minutes == 0 {
            return Err(AppError::Config(
                "CHECK_INTERVAL_MINUTES must be positive".to_string(),
            ));
        }
        let retention_days = parse_var(&lookup, "RETENTION_DAYS", 7u32)?;

        let mut portal = PortalConfig::default();
        if let Some(url) = lookup("PORTAL_URL") {
            portal.base_url = url;
        }
        portal.timeout = Duration::from_secs(parse_var(&lookup, "PORTAL_TIMEOUT_SECS", 30u64)?);

        let fcm_timeout = Duration::from_secs(parse_var(&lookup, "FCM_TIMEOUT_SECS", 30u64)?);
        let fcm = match (lookup("FCM_PROJECT_ID"), lookup("FCM_ACCESS_TOKEN")) {
            (Some(project_id), Some(access_token)) => Some(FcmConfig {
                project_id,
                access_token,
                timeout: fcm_timeout,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            check_interval: Duration::from_secs(interval_minutes * 60),
            retention_days,
            portal,
            fcm,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} is not a valid value: {:?}", name, raw))),
        None => Ok(default),
    }
}
