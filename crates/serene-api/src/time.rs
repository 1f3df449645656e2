use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Render a stored timestamp as ISO-8601 UTC. Values that do not parse as a
/// timestamp are passed through untouched.
pub fn display_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's datetime('now') form, naive UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_is_normalised_to_utc() {
        assert_eq!(
            display_timestamp("2025-03-01T10:00:00.5+02:00"),
            "2025-03-01T08:00:00.500000Z"
        );
        assert_eq!(
            display_timestamp("2025-03-01T08:00:00.123456Z"),
            "2025-03-01T08:00:00.123456Z"
        );
    }

    #[test]
    fn sqlite_datetime_is_accepted() {
        assert_eq!(display_timestamp("2025-03-01 08:00:00"), "2025-03-01T08:00:00.000000Z");
    }

    #[test]
    fn unparseable_value_falls_back_to_raw() {
        assert_eq!(display_timestamp("SERVER_TIMESTAMP"), "SERVER_TIMESTAMP");
        assert_eq!(display_timestamp(""), "");
    }
}
