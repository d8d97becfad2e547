pub mod changes;
pub mod schedule;
pub mod session;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::config::PortalConfig;
use crate::error::AppError;
use crate::models::{Change, Lesson};

pub use changes::{parse_change, parse_changes_page};
pub use schedule::parse_schedule;
pub use session::{FormSession, FormTokens, Page};

static CLASS_SELECT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"select[name*="ClassesList"]"#).expect("static selector"));
static OPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").expect("static selector"));
static NUMERIC_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*\d+)+\s*$").expect("static regex"));

/// Read access to the school timetable, live from the source.
#[async_trait]
pub trait TimetableSource: Send + Sync {
    /// class name -> class id
    async fn list_classes(&self) -> Result<BTreeMap<String, String>, AppError>;
    async fn fetch_schedule(&self, class_id: &str) -> Result<Vec<Lesson>, AppError>;
    async fn fetch_changes(&self, class_id: &str) -> Result<Vec<Change>, AppError>;

    /// Normalized subject -> teachers teaching it.
    async fn unique_subjects(
        &self,
        class_id: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, AppError> {
        let lessons = self.fetch_schedule(class_id).await?;
        Ok(group_subjects(&lessons))
    }
}

/// Scrapes the WebForms timetable portal. Every call runs in its own [`FormSession`].
pub struct PortalScraper {
    config: PortalConfig,
}

impl PortalScraper {
    pub fn new(config: PortalConfig) -> Self {
        Self { config }
    }

    /// Load the portal, pick the class, then open the requested tab.
    async fn open_class_tab(&self, class_id: &str, tab_button: &str) -> Result<Page, AppError> {
        let mut session = FormSession::new(&self.config)?;
        session.load(&self.config.base_url).await?;

        let control = self.config.class_list_control.as_str();
        session.postback(control, "", &[(control, class_id)]).await?;
        session.postback(tab_button, "", &[]).await
    }
}

#[async_trait]
impl TimetableSource for PortalScraper {
    async fn list_classes(&self) -> Result<BTreeMap<String, String>, AppError> {
        let mut session = FormSession::new(&self.config)?;
        let page = session.load(&self.config.base_url).await?;
        let classes = parse_class_list(&page.html());
        info!("portal lists {} classes", classes.len());
        Ok(classes)
    }

    async fn fetch_schedule(&self, class_id: &str) -> Result<Vec<Lesson>, AppError> {
        let page = self
            .open_class_tab(class_id, &self.config.timetable_button)
            .await?;
        let lessons = parse_schedule(&page.html());
        debug!("class {}: {} lessons", class_id, lessons.len());
        Ok(lessons)
    }

    async fn fetch_changes(&self, class_id: &str) -> Result<Vec<Change>, AppError> {
        let page = self
            .open_class_tab(class_id, &self.config.changes_button)
            .await?;
        let changes = parse_changes_page(&page.html());
        debug!("class {}: {} live changes", class_id, changes.len());
        Ok(changes)
    }
}

/// Options of the class drop-down, name -> id. Placeholder options without a value are skipped.
pub fn parse_class_list(html: &Html) -> BTreeMap<String, String> {
    let Some(select) = html.select(&CLASS_SELECT).next() else {
        return BTreeMap::new();
    };

    select
        .select(&OPTION)
        .filter_map(|option| {
            let id = option.value().attr("value")?.trim();
            if id.is_empty() {
                return None;
            }
            let name = option.text().collect::<String>().trim().to_string();
            Some((name, id.to_string()))
        })
        .collect()
}

/// Drops trailing group numbers: `"Literature 30"` -> `"Literature"`.
pub fn normalize_subject(subject: &str) -> String {
    let stripped = NUMERIC_SUFFIX.replace(subject, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        subject.trim().to_string()
    } else {
        stripped.to_string()
    }
}

pub fn group_subjects(lessons: &[Lesson]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for lesson in lessons {
        let teachers = grouped.entry(normalize_subject(&lesson.subject)).or_default();
        if !lesson.teacher.is_empty() {
            teachers.insert(lesson.teacher.clone());
        }
    }
    grouped
        .into_iter()
        .map(|(subject, teachers)| (subject, teachers.into_iter().collect()))
        .collect()
}
