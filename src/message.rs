use chrono::{DateTime, Datelike, FixedOffset, Utc, Weekday};

use crate::WATCH_URL_BASE;
use crate::error::{NotifierError, Result};
use crate::types::EventRecord;

/// Offset announcements are rendered in (JST).
const LOCAL_OFFSET_SECS: i32 = 9 * 3600;

/// Parse the API's `scheduledStartTime`.
///
/// The trailing `Z` is rewritten to an explicit `+00:00` offset first.
pub fn parse_scheduled_start(raw: &str) -> Result<DateTime<Utc>> {
    let normalized = match raw.strip_suffix('Z') {
        Some(prefix) => format!("{prefix}+00:00"),
        None => raw.to_string(),
    };
    DateTime::parse_from_rfc3339(&normalized)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NotifierError::malformed(format!("scheduledStartTime {raw:?}: {e}")))
}

fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(LOCAL_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

fn weekday_ja(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "月",
        Weekday::Tue => "火",
        Weekday::Wed => "水",
        Weekday::Thu => "木",
        Weekday::Fri => "金",
        Weekday::Sat => "土",
        Weekday::Sun => "日",
    }
}

/// Render a UTC instant as JST long form, e.g. `2024年01月01日 (月) 12時00分00秒`.
pub fn format_start_time(start: DateTime<Utc>) -> String {
    let local = start.with_timezone(&local_offset());
    format!(
        "{} ({}) {}",
        local.format("%Y年%m月%d日"),
        weekday_ja(local.weekday()),
        local.format("%H時%M分%S秒"),
    )
}

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_BASE}{video_id}")
}

/// Three-line announcement: channel, linked title, start time.
pub fn format_announcement(event: &EventRecord) -> String {
    [
        format!("チャンネル名: {}", event.channel_title),
        format!("配信名: <{}|{}>", watch_url(&event.video_id), event.title),
        format!("開始時刻: {}", format_start_time(event.scheduled_start)),
    ]
    .join("\n")
}
