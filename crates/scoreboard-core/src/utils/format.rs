use chrono::{DateTime, Local, Utc};

/// Format a point delta with an explicit sign: `+50`, `-10`, `0`
pub fn format_delta(points: i64) -> String {
    if points > 0 {
        format!("+{}", points)
    } else {
        points.to_string()
    }
}

/// Truncate a string to a maximum length in characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Truncate or pad to exactly `width` characters for column output
pub fn pad_display(s: &str, width: usize) -> String {
    format!("{:<width$}", truncate_string(s, width), width = width)
}

/// Local `HH:MM` for today's entries, `DD.MM HH:MM` otherwise
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    let local = ts.with_timezone(&Local);
    if local.date_naive() == Local::now().date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%d.%m %H:%M").to_string()
    }
}
