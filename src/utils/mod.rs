//! Utility functions shared by the database and ingestion layers

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::errors::RepositoryError;

pub mod url;

pub use url::UrlUtils;

/// Parse datetime from SQLite format or RFC3339 format
pub fn parse_datetime(datetime_str: &str) -> Result<DateTime<Utc>, RepositoryError> {
    // Try parsing as RFC3339 first (with timezone info)
    if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP, assumed UTC
    if let Ok(naive_dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
    }

    Err(RepositoryError::InvalidTimestamp {
        value: datetime_str.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_datetime("2024-03-01T12:30:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("2024-03-01T14:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_datetime("2024-03-01 12:30:00").unwrap(), expected);
        assert!(matches!(
            parse_datetime("yesterday"),
            Err(RepositoryError::InvalidTimestamp { .. })
        ));
    }
}
