//! Spreadsheet serial date/time conversion
//!
//! Serials count days since the 1900 date system epoch, with the fractional
//! part as the time of day. Every conversion goes through `DateTime<Utc>` so
//! the host's local offset never shifts a decoded value.

use chrono::{DateTime, Datelike, Timelike, Utc};
use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;
use tracing::warn;

/// Serial of 1970-01-01 in the 1900 date system
pub const UNIX_EPOCH_SERIAL: f64 = 25569.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;
const MINUTES_PER_DAY: f64 = 1440.0;

/// Year that time-only values land on once converted to a full date
const TIME_ONLY_YEAR: i32 = 1899;

const FALLBACK_DATE_FORMAT: &str = "%Y/%m/%d";

/// Time-of-day fraction to `H:MM`. A fraction that rounds to a full day
/// gives `24:00`.
pub fn fraction_to_clock(fraction: f64) -> String {
    let total_minutes = (fraction * MINUTES_PER_DAY).round() as i64;
    format!("{}:{:02}", total_minutes / 60, total_minutes % 60)
}

/// Serial to a UTC instant. Non-finite or out-of-range serials give `None`.
pub fn serial_to_date(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() {
        return None;
    }
    let millis = ((serial - UNIX_EPOCH_SERIAL) * MILLIS_PER_DAY).round();
    if millis.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Display text of a decoded date. Values on the time-only year render as a
/// clock time read from the UTC fields, everything else as a date in
/// `date_format`.
pub fn display_datetime(value: &DateTime<Utc>, date_format: &str) -> String {
    if value.year() == TIME_ONLY_YEAR {
        return format!("{}:{:02}", value.hour(), value.minute());
    }

    let mut out = String::new();
    if write!(out, "{}", value.format(date_format)).is_err() {
        warn!(date_format, "invalid date format, using {}", FALLBACK_DATE_FORMAT);
        out.clear();
        // The fallback format is known to be valid
        let _ = write!(out, "{}", value.format(FALLBACK_DATE_FORMAT));
    }
    out
}

/// `HH:MM:SS` text to `HH:MM`; anything else is returned unchanged
pub fn normalize_clock_text(text: &str) -> String {
    static CLOCK_TEXT: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    match CLOCK_TEXT.get_or_init(|| Regex::new(r"^\s*(\d{1,2}):(\d{2}):(\d{2})\s*$")) {
        Ok(re) => re.replace(text, "$1:$2").into_owned(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fraction_to_clock_boundaries() {
        assert_eq!(fraction_to_clock(0.0), "0:00");
        assert_eq!(fraction_to_clock(0.5), "12:00");
        assert_eq!(fraction_to_clock(0.29167), "7:00");
        assert_eq!(fraction_to_clock(0.99999), "24:00");
        assert_eq!(fraction_to_clock(0.75 + 5.0 / 1440.0), "18:05");
    }

    #[test]
    fn test_fraction_matches_rounded_minutes() {
        for i in 1..1000 {
            let fraction = i as f64 / 1000.0;
            let minutes = (fraction * 1440.0).round() as i64;
            assert_eq!(
                fraction_to_clock(fraction),
                format!("{}:{:02}", minutes / 60, minutes % 60)
            );
        }
    }

    #[test]
    fn test_serial_to_date() {
        assert_eq!(
            serial_to_date(UNIX_EPOCH_SERIAL),
            Some(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap())
        );
        // 2024-03-15 12:00 UTC
        assert_eq!(
            serial_to_date(45366.5),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(serial_to_date(f64::NAN), None);
        assert_eq!(serial_to_date(f64::INFINITY), None);
        assert_eq!(serial_to_date(1e300), None);
    }

    #[test]
    fn test_display_datetime() {
        let date = Utc.with_ymd_and_hms(2024, 3, 15, 23, 30, 0).unwrap();
        assert_eq!(display_datetime(&date, "%Y/%m/%d"), "2024/03/15");
        assert_eq!(display_datetime(&date, "%d.%m.%Y"), "15.03.2024");

        let time_only = Utc.with_ymd_and_hms(1899, 12, 30, 7, 5, 0).unwrap();
        assert_eq!(display_datetime(&time_only, "%Y/%m/%d"), "7:05");
    }

    #[test]
    fn test_display_datetime_bad_format_falls_back() {
        let date = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(display_datetime(&date, "%Q"), "2024/03/15");
    }

    #[test]
    fn test_normalize_clock_text() {
        assert_eq!(normalize_clock_text("07:30:00"), "07:30");
        assert_eq!(normalize_clock_text("7:30:15"), "7:30");
        assert_eq!(normalize_clock_text("07:30"), "07:30");
        assert_eq!(normalize_clock_text("Shift 07:30:00"), "Shift 07:30:00");
    }
}
