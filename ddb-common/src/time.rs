//! Timestamp utilities
//!
//! Source dumps encode time in many ways (RFC 3339, Twitter's
//! `Wed Oct 10 20:19:24 +0000 2018`, MySQL datetimes, epoch millis).
//! Converters normalise all of them to `DateTime<Utc>` through [`parse_timestamp`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert epoch milliseconds to a UTC timestamp
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

const OFFSET_FORMATS: &[&str] = &[
    "%a %b %d %H:%M:%S %z %Y", // Twitter / TAGS
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y%m%d%H%M%S", // MediaWiki revision timestamps
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse a timestamp in any of the formats seen in source dumps.
///
/// Naive timestamps are taken to be UTC. Purely numeric input is read as
/// epoch milliseconds unless it is a 14-digit MediaWiki timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let numeric = raw.chars().all(|c| c.is_ascii_digit());
    if numeric && raw.len() != 14 {
        return raw.parse::<i64>().ok().and_then(from_millis);
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_timestamp("2013-05-14T17:46:47.620Z").unwrap();
        assert_eq!(ts.year(), 2013);
        assert_eq!(ts.month(), 5);
        assert_eq!(ts.hour(), 17);
    }

    #[test]
    fn test_parse_twitter_format_converts_offset() {
        let ts = parse_timestamp("Wed Oct 10 20:19:24 +0200 2018").unwrap();
        assert_eq!(ts.day(), 10);
        assert_eq!(ts.hour(), 18);
    }

    #[test]
    fn test_parse_mysql_datetime() {
        let ts = parse_timestamp("2016-02-01 09:15:00").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2016, 2, 1));
        assert_eq!(ts.minute(), 15);
    }

    #[test]
    fn test_parse_mediawiki_timestamp() {
        let ts = parse_timestamp("20150311143005").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2015, 3, 11));
        assert_eq!(ts.second(), 5);
    }

    #[test]
    fn test_parse_epoch_millis() {
        let ts = parse_timestamp("1368553607620").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_368_553_607_620);
    }

    #[test]
    fn test_parse_date_only() {
        let ts = parse_timestamp("2014-12-31").unwrap();
        assert_eq!(ts.hour(), 0);
        assert_eq!(ts.day(), 31);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("   ").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
