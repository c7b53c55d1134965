//! iCalendar (RFC 5545) export of a single event.

use crate::data::Event;
use chrono::{DateTime, Utc};

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | ';' | ',' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

fn date(value: DateTime<Utc>) -> String {
    value.format("%Y%m%dT%H%M%SZ").to_string()
}

/// A `VCALENDAR` holding one `VEVENT`, with CRLF line endings.
pub fn calendar(event: &Event) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Meetup MCP//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@meetup-mcp", event.id),
        format!("DTSTART:{}", date(event.starts_at)),
    ];
    if let Some(ends_at) = event.ends_at {
        lines.push(format!("DTEND:{}", date(ends_at)));
    }
    lines.push(format!("SUMMARY:{}", escape(&event.title)));
    if let Some(description) = event.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!("DESCRIPTION:{}", escape(description)));
    }
    lines.push(format!("LOCATION:{}", escape(&event.venue)));
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());
    lines.join("\r\n")
}

/// `<title>.ics` with every non-alphanumeric ASCII character replaced.
pub fn filename(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}.ics")
}
