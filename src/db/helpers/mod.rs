use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_conversions_reject_out_of_range() {
        assert!(to_i64(u64::MAX).is_err());
        assert_eq!(to_i64(42).unwrap(), 42);
        assert!(to_u64(-1, "total").is_err());
        assert_eq!(to_u64(7, "total").unwrap(), 7);
    }

    #[test]
    fn parses_rfc3339() {
        let dt = parse_datetime("2026-03-01T10:15:00+02:00", "date").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-01T08:15:00+00:00");
        assert!(parse_datetime("yesterday", "date").is_err());
    }
}
