use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::models::{Change, ChangeType};

static MESSAGE_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.MsgCell").expect("static selector"));

static LESSON_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:שיעור|lesson)\s*(\d+)").expect("static regex"));
static CANCELLATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ביטול|cancel").expect("static regex"));
static ROOM_SWAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)החלפת חדר|room swap|room change").expect("static regex"));
static NEW_ROOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:לחדר|to room)\s+(\S+)").expect("static regex"));

/// Every parseable change message on a changes page.
pub fn parse_changes_page(html: &Html) -> Vec<Change> {
    html.select(&MESSAGE_CELL)
        .filter_map(|cell| {
            let text = cell
                .text()
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() {
                None
            } else {
                parse_change(&text)
            }
        })
        .collect()
}

/// Parses `<date>, <lesson N>, <teacher>, <description...>`.
///
/// Lines that do not follow the grammar are dropped (`None`), never an error.
pub fn parse_change(text: &str) -> Option<Change> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() < 4 {
        return None;
    }

    let date = parts[0].to_string();
    let lesson_number = LESSON_NUMBER
        .captures(parts[1])?
        .get(1)?
        .as_str()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)?;
    let teacher = parts[2].to_string();
    if teacher.is_empty() {
        return None;
    }
    let description = parts[3..].join(", ");

    let (change_type, new_room) = classify(&description);

    Some(Change {
        date,
        lesson_number,
        teacher,
        change_type,
        description,
        new_room,
    })
}

fn classify(description: &str) -> (ChangeType, Option<String>) {
    if CANCELLATION.is_match(description) {
        (ChangeType::Cancellation, None)
    } else if ROOM_SWAP.is_match(description) {
        let room = NEW_ROOM
            .captures(description)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        (ChangeType::RoomChange, room)
    } else {
        (ChangeType::Other, None)
    }
}
