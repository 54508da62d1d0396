//! Repository utilities.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::result::DatabaseErrorInformation;

/// Date format for `meals.date` columns (sorts lexicographically).
pub const DB_DATE_FMT: &str = "%Y-%m-%d";

/// Simple error info wrapper for database errors.
#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error to a diesel error with proper message.
pub fn to_diesel_error(e: impl std::fmt::Display) -> diesel::result::Error {
    diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DB_DATE_FMT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DB_DATE_FMT).ok()
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Turn a `sqlite:` URL or bare path into a filesystem path, if it is one.
pub fn sqlite_path(database_url: &str) -> Option<std::path::PathBuf> {
    let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
    let path = path.strip_prefix("//").unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(std::path::PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(format_date(date), "2026-10-19");
        assert_eq!(parse_date("2026-10-19"), Some(date));
        assert_eq!(parse_date("19/10/2026"), None);
    }

    #[test]
    fn test_sqlite_path() {
        assert_eq!(
            sqlite_path("sqlite:/data/menus.db"),
            Some(std::path::PathBuf::from("/data/menus.db"))
        );
        assert_eq!(sqlite_path("sqlite::memory:"), None);
    }

    #[test]
    fn test_bad_datetime_defaults_to_epoch() {
        assert_eq!(parse_datetime("yesterday"), DateTime::UNIX_EPOCH);
    }
}
