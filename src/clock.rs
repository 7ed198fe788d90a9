//! Timestamp helpers. Archive timestamps are UNIX nanoseconds throughout the
//! pipeline; chrono enters only at the edges, for parsing operator-supplied
//! window bounds and for formatting axis labels and tables.

use chrono::{DateTime, NaiveDateTime, Utc};

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

pub fn to_datetime(ns: u64) -> DateTime<Utc> {
    let secs = (ns / NANOS_PER_SEC) as i64;
    let subsec = (ns % NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, subsec).unwrap_or_default()
}

pub fn format(ns: u64, fmt: &str) -> String {
    to_datetime(ns).format(fmt).to_string()
}

/// Parse an operator-supplied time bound. Accepts RFC 3339 or a naive
/// `YYYY-MM-DD HH:MM:SS` interpreted as UTC.
pub fn parse(s: &str) -> Option<u64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_nanos_opt().and_then(|ns| u64::try_from(ns).ok());
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return naive
            .and_utc()
            .timestamp_nanos_opt()
            .and_then(|ns| u64::try_from(ns).ok());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339() {
        let ns = parse("1970-01-01T00:00:05Z").expect("parse");
        assert_eq!(ns, 5 * NANOS_PER_SEC);
    }

    #[test]
    fn parses_naive_as_utc() {
        let ns = parse("1970-01-01 00:01:00").expect("parse");
        assert_eq!(ns, 60 * NANOS_PER_SEC);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("five past noon").is_none());
    }

    #[test]
    fn formats_round_trip() {
        let ns = parse("2024-03-01T12:30:00Z").expect("parse");
        assert_eq!(format(ns, "%Y-%m-%d %H:%M:%S"), "2024-03-01 12:30:00");
    }
}
