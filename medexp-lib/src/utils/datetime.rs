use chrono::prelude::{Datelike, Local};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// `errors.log` timestamps: UTC, whole seconds, `Z` suffix.
pub fn log_timestamp() -> String {
    return Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
}

/// Today's local date as `YYYY-MM-DD`, for default export file names.
pub fn local_date_stamp() -> String {
    return Local::now().date_naive().format("%Y-%m-%d").to_string();
}

/// The filing year normally being prepared: the calendar year before today.
pub fn default_fiscal_year() -> i32 {
    return Local::now().year() - 1;
}

/// Parse a calendar day from either `YYYY-MM-DD` or a full ISO 8601 date-time.
///
/// Date-times are reduced to their UTC calendar day, which is how the browser
/// build of the form serialized payment dates.
pub fn parse_iso_calendar_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.naive_utc().date());
    }
    // `2023-06-01T00:00:00` without an offset
    if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(datetime.date());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_timestamp_is_utc_seconds() {
        let timestamp = log_timestamp();
        assert!(timestamp.ends_with('Z'));
        assert!(!timestamp.contains('.'));
        assert!(DateTime::parse_from_rfc3339(&timestamp).is_ok());
    }

    #[test]
    fn test_local_date_stamp_parses_as_date() {
        assert!(NaiveDate::parse_from_str(&local_date_stamp(), "%Y-%m-%d").is_ok());
    }

    #[test]
    fn test_parse_plain_date() {
        assert_eq!(
            parse_iso_calendar_day("2023-06-01"),
            NaiveDate::from_ymd_opt(2023, 6, 1)
        );
    }

    #[test]
    fn test_parse_browser_datetime_takes_utc_day() {
        assert_eq!(
            parse_iso_calendar_day("2023-06-01T00:00:00.000Z"),
            NaiveDate::from_ymd_opt(2023, 6, 1)
        );
        // 2023-06-01 08:00 in Tokyo is still 2023-05-31 in UTC
        assert_eq!(
            parse_iso_calendar_day("2023-05-31T23:00:00.000Z"),
            NaiveDate::from_ymd_opt(2023, 5, 31)
        );
        assert_eq!(
            parse_iso_calendar_day("2023-06-01T08:00:00+09:00"),
            NaiveDate::from_ymd_opt(2023, 5, 31)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_iso_calendar_day("not a date"), None);
        assert_eq!(parse_iso_calendar_day("2023-13-01"), None);
        assert_eq!(parse_iso_calendar_day(""), None);
    }
}
