//! Table and value formatting for CLI output.

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table};
use imgstore_core::image::truncate_id;

/// Placeholder shown for missing repository, tag or timestamp values.
pub const NONE: &str = "<none>";

/// Create a borderless table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Format a byte count in decimal units (`1.5 MB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["kB", "MB", "GB", "TB"];

    if bytes < 1000 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}

/// Format a timestamp relative to now (`3 hours ago`).
pub fn format_ago(dt: &DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(*dt);

    let secs = duration.num_seconds();
    if secs < 1 {
        return "Less than a second ago".to_string();
    }

    let (count, unit) = if secs < 60 {
        (secs, "second")
    } else if duration.num_minutes() < 60 {
        (duration.num_minutes(), "minute")
    } else if duration.num_hours() < 24 {
        (duration.num_hours(), "hour")
    } else if duration.num_days() < 30 {
        (duration.num_days(), "day")
    } else if duration.num_days() < 365 {
        (duration.num_days() / 30, "month")
    } else {
        (duration.num_days() / 365, "year")
    };

    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Format an optional creation time.
pub fn format_created(created: Option<&DateTime<Utc>>) -> String {
    created.map(format_ago).unwrap_or_else(|| NONE.to_string())
}

/// Image ID for display, shortened unless `no_trunc`.
pub fn display_id(id: &str, no_trunc: bool) -> &str {
    if no_trunc {
        id
    } else {
        truncate_id(id)
    }
}

/// Cut `s` to at most `max_len` characters, marking the cut with `...`.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(1000), "1.0 kB");
        assert_eq!(format_bytes(1_500_000), "1.5 MB");
        assert_eq!(format_bytes(2_000_000_000), "2.0 GB");
    }

    #[test]
    fn test_new_table_with_rows() {
        let mut table = new_table(&["REPOSITORY", "TAG"]);
        table.add_row(["lib", "v1"]);
        let output = table.to_string();
        assert!(output.contains("REPOSITORY"));
        assert!(output.contains("lib"));
        assert!(output.contains("v1"));
    }

    #[test]
    fn test_format_ago_units() {
        let now = Utc::now();
        assert_eq!(format_ago(&now), "Less than a second ago");
        assert_eq!(format_ago(&(now - Duration::seconds(30))), "30 seconds ago");
        assert_eq!(format_ago(&(now - Duration::minutes(1))), "1 minute ago");
        assert_eq!(format_ago(&(now - Duration::hours(5))), "5 hours ago");
        assert_eq!(format_ago(&(now - Duration::days(1))), "1 day ago");
        assert_eq!(format_ago(&(now - Duration::days(60))), "2 months ago");
        assert_eq!(format_ago(&(now - Duration::days(730))), "2 years ago");
    }

    #[test]
    fn test_format_ago_future() {
        let future = Utc::now() + Duration::hours(1);
        assert_eq!(format_ago(&future), "Less than a second ago");
    }

    #[test]
    fn test_format_created_missing() {
        assert_eq!(format_created(None), NONE);
    }

    #[test]
    fn test_display_id() {
        let id = "a".repeat(64);
        assert_eq!(display_id(&id, false), "a".repeat(12));
        assert_eq!(display_id(&id, true), id);
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hello world", 3), "...");
    }
}
