use automa_core::types::JobId;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{Result, SchedulerError};

/// Accepted layouts for timestamps without an offset; these are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Deterministic trigger key for a job, e.g. `job-42`.
pub fn trigger_key(job_id: JobId) -> String {
    format!("job-{job_id}")
}

/// Parse a requested run time.
///
/// RFC 3339 input keeps its offset; naive input is treated as UTC.
pub fn parse_when(input: &str) -> Result<DateTime<Utc>> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| SchedulerError::InvalidTime(format!("unrecognised timestamp `{input}`")))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn key_is_derived_from_id() {
        assert_eq!(trigger_key(7), "job-7");
    }

    #[test]
    fn rfc3339_with_offset_is_converted() {
        let dt = parse_when("2030-05-01T12:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn zulu_suffix_with_fraction() {
        let dt = parse_when("2030-05-01T12:00:01.250Z").unwrap();
        assert_eq!(dt.second(), 1);
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn naive_input_is_utc() {
        let dt = parse_when("2030-05-01T12:30:00").unwrap();
        assert_eq!((dt.hour(), dt.minute()), (12, 30));
        assert_eq!(dt.timezone(), Utc);

        let spaced = parse_when("2030-05-01 12:30").unwrap();
        assert_eq!(spaced, dt);
    }

    #[test]
    fn surrounding_whitespace_ignored() {
        let dt = parse_when("  2030-01-02T03:04:05Z ").unwrap();
        assert_eq!(dt.day(), 2);
    }

    #[test]
    fn garbage_is_invalid_time() {
        assert!(matches!(
            parse_when("next tuesday"),
            Err(SchedulerError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_when("2030-13-40T00:00:00"),
            Err(SchedulerError::InvalidTime(_))
        ));
    }
}
