use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{Lesson, SchoolDay};

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table.TTTable"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td.TTCell"));
static LESSON: LazyLock<Selector> = LazyLock::new(|| selector("div.TTLesson"));
static BOLD: LazyLock<Selector> = LazyLock::new(|| selector("b"));
static LINE_BREAK: LazyLock<Selector> = LazyLock::new(|| selector("br"));

static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)").expect("static regex"));

const GROUP_KEYWORDS: [&str; 2] = ["קבוצה", "group"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Lessons of the weekly timetable, row by row, days in column order.
///
/// Best effort: blocks without a bold subject or without a teacher line are skipped,
/// and a page without the timetable yields nothing.
pub fn parse_schedule(html: &Html) -> Vec<Lesson> {
    let Some(table) = html.select(&TABLE).next() else {
        return Vec::new();
    };

    let mut lessons = Vec::new();
    // First row is the day header.
    for (index, row) in table.select(&ROW).skip(1).enumerate() {
        let lesson_number = index as u32 + 1;
        for (day, cell) in SchoolDay::ALL.into_iter().zip(row.select(&CELL)) {
            for block in cell.select(&LESSON) {
                if let Some(lesson) = parse_block(block, day, lesson_number) {
                    lessons.push(lesson);
                }
            }
        }
    }
    lessons
}

fn parse_block(block: ElementRef, day: SchoolDay, lesson_number: u32) -> Option<Lesson> {
    let bold = block.select(&BOLD).next()?;
    let raw_subject = bold.text().collect::<String>();
    let (subject, room, group) = split_annotation(raw_subject.trim());

    let teacher = teacher_line(block).unwrap_or_default();
    if subject.is_empty() || teacher.is_empty() {
        return None;
    }

    Some(Lesson {
        day,
        lesson_number,
        subject,
        teacher,
        room,
        group,
    })
}

/// Splits `"Physics (room 12)"` into subject and a room or group annotation.
fn split_annotation(text: &str) -> (String, Option<String>, Option<String>) {
    let Some(caps) = ANNOTATION.captures(text) else {
        return (text.to_string(), None, None);
    };
    let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
        return (text.to_string(), None, None);
    };

    let subject = text[..whole.start()].trim().to_string();
    let info = inner.as_str().trim().to_string();
    let lowered = info.to_lowercase();
    if GROUP_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        (subject, None, Some(info))
    } else {
        (subject, Some(info), None)
    }
}

/// Text right after the first line break of a lesson block.
fn teacher_line(block: ElementRef) -> Option<String> {
    let br = block.select(&LINE_BREAK).next()?;
    let next = br.next_sibling()?;
    let text = match next.value().as_text() {
        Some(text) => text.to_string(),
        None => ElementRef::wrap(next)?.text().collect::<String>(),
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
