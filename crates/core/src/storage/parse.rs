//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::{BookingStatus, EventCategory, Money, PaymentStatus, UserRole};

fn conversion_error<E>(e: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e))
}

fn unknown_value(kind: &str, value: &str) -> SqlError {
    SqlError::FromSqlConversionFailure(
        0,
        Type::Text,
        format!("unknown {} '{}'", kind, value).into(),
    )
}

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(conversion_error)
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_error)
}

/// Parse an optional DateTime from an RFC3339 string
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Fixed-width UTC timestamp; lexicographic order matches time order
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(s: &str) -> Result<NaiveDate, SqlError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(conversion_error)
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_category(s: &str) -> Result<EventCategory, SqlError> {
    EventCategory::from_str(s).ok_or_else(|| unknown_value("category", s))
}

pub fn parse_booking_status(s: &str) -> Result<BookingStatus, SqlError> {
    BookingStatus::from_str(s).ok_or_else(|| unknown_value("booking status", s))
}

pub fn parse_payment_status(s: &str) -> Result<PaymentStatus, SqlError> {
    PaymentStatus::from_str(s).ok_or_else(|| unknown_value("payment status", s))
}

pub fn parse_role(s: &str) -> Result<UserRole, SqlError> {
    UserRole::from_str(s).ok_or_else(|| unknown_value("role", s))
}

/// Read a non-negative integer column as `u32`
pub fn to_u32(value: i64) -> Result<u32, SqlError> {
    u32::try_from(value).map_err(|_| SqlError::IntegralValueOutOfRange(0, value))
}

/// Read a non-negative aggregate column as `u64`
pub fn to_u64(value: i64) -> Result<u64, SqlError> {
    u64::try_from(value).map_err(|_| SqlError::IntegralValueOutOfRange(0, value))
}

pub fn to_money(cents: i64) -> Money {
    Money::from_cents(cents)
}

/// `LIKE` pattern matching `s` anywhere, with wildcards in `s` escaped.
/// Use together with `ESCAPE '\'`.
pub fn contains_pattern(s: &str) -> String {
    let mut pattern = String::with_capacity(s.len() + 2);
    pattern.push('%');
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// True if `err` is a UNIQUE constraint violation
pub fn is_unique_violation(err: &SqlError) -> bool {
    matches!(
        err,
        SqlError::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_datetime_format_is_sortable() {
        let a = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let (fa, fb) = (format_datetime(&a), format_datetime(&b));
        assert_eq!(fa, "2026-01-09T23:59:59.000000Z");
        assert!(fa < fb);
        assert_eq!(parse_datetime(&fa).unwrap(), a);
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_negative_count_rejected() {
        assert!(to_u32(-1).is_err());
        assert_eq!(to_u64(7).unwrap(), 7);
    }
}
