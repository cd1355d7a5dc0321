use chrono::{DateTime, Local};

use crate::model::Schedule;

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

/// Catalog summaries are HTML fragments; terminals get the text only.
pub(crate) fn strip_markup(summary: &str) -> String {
    let mut out = String::with_capacity(summary.len());
    let mut in_tag = false;
    for ch in summary.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

pub(crate) fn format_rating(rating: f32) -> String {
    if rating > 0.0 {
        format!("{rating:.1}")
    } else {
        "-".to_string()
    }
}

pub(crate) fn format_schedule(schedule: &Schedule) -> String {
    match (schedule.days.is_empty(), schedule.time.is_empty()) {
        (true, true) => "-".to_string(),
        (false, true) => schedule.days.join(", "),
        (true, false) => schedule.time.clone(),
        (false, false) => format!("{} at {}", schedule.days.join(", "), schedule.time),
    }
}

pub(crate) fn format_synced_at(millis: i64) -> String {
    if millis <= 0 {
        return "never".to_string();
    }
    DateTime::from_timestamp_millis(millis)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M %:z")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}
