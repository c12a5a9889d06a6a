//! Timestamp formatting utilities
//!
//! Provides standardized, configurable timestamp layouts for log output.

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use std::fmt::{self, Write};
use serde::{Deserialize, Serialize};

/// Layout used by sinks when rendering the record time
///
/// # Examples
///
/// ```
/// use fanout_logger::TimestampFormat;
/// use chrono::{TimeZone, Utc};
///
/// let ts = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// assert_eq!(TimestampFormat::Rfc3339Millis.format(&ts), "2025-01-08T10:30:45.000+00:00");
/// assert_eq!(TimestampFormat::Custom("%H:%M".into()).format(&ts), "10:30");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// RFC 3339 with milliseconds and offset: `2025-01-08T10:30:45.123+00:00`
    #[default]
    Rfc3339Millis,

    /// strftime layout rendered in UTC
    Custom(String),

    /// strftime layout rendered in the host's local time zone
    Local(String),

    /// No timestamp at all
    None,
}

impl TimestampFormat {
    /// Default human-readable layout for console and file sinks
    pub const DEFAULT_LAYOUT: &'static str = "%Y-%m-%d %H:%M:%S%.3f";

    /// Local-time strftime layout; an empty layout disables the timestamp
    #[must_use]
    pub fn layout(layout: &str) -> Self {
        if layout.is_empty() {
            TimestampFormat::None
        } else {
            TimestampFormat::Local(layout.to_string())
        }
    }

    /// Format a `DateTime<Utc>` according to this format
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Rfc3339Millis => {
                datetime.to_rfc3339_opts(SecondsFormat::Millis, false)
            }
            TimestampFormat::Custom(layout) => render_layout(datetime, layout),
            TimestampFormat::Local(layout) => {
                render_layout(&datetime.with_timezone(&Local), layout)
            }
            TimestampFormat::None => String::new(),
        }
    }
}

/// Render a user-supplied strftime layout; an invalid layout renders empty
fn render_layout<Tz>(datetime: &DateTime<Tz>, layout: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut out = String::new();
    if write!(out, "{}", datetime.format(layout)).is_err() {
        out.clear();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_datetime() -> DateTime<Utc> {
        // 2025-01-08 10:30:45.123456 UTC
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + chrono::Duration::microseconds(123456)
    }

    #[test]
    fn test_rfc3339_millis_format() {
        let result = TimestampFormat::Rfc3339Millis.format(&fixed_datetime());
        assert_eq!(result, "2025-01-08T10:30:45.123+00:00");
    }

    #[test]
    fn test_custom_format() {
        let format = TimestampFormat::Custom("%Y/%m/%d %H:%M".to_string());
        assert_eq!(format.format(&fixed_datetime()), "2025/01/08 10:30");
    }

    #[test]
    fn test_empty_layout_disables_timestamp() {
        assert_eq!(TimestampFormat::layout(""), TimestampFormat::None);
        assert_eq!(TimestampFormat::None.format(&fixed_datetime()), "");
    }

    #[test]
    fn test_local_layout_shape() {
        let rendered = TimestampFormat::layout(TimestampFormat::DEFAULT_LAYOUT)
            .format(&fixed_datetime());
        // date, time and three fractional digits, whatever the host offset
        assert_eq!(rendered.len(), "2025-01-08 10:30:45.123".len());
        assert!(rendered.ends_with(".123"));
    }

    #[test]
    fn test_invalid_layout_renders_empty() {
        let format = TimestampFormat::Custom("%Q%".to_string());
        assert_eq!(format.format(&fixed_datetime()), "");
    }

    #[test]
    fn test_deserialization() {
        let format: TimestampFormat =
            serde_json::from_str(r#"{"Custom":"%Y-%m-%d"}"#).expect("deserialize Custom");
        assert_eq!(format, TimestampFormat::Custom("%Y-%m-%d".to_string()));
    }
}
