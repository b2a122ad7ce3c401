//! Row mapping between SQLite and the domain types
//!
//! | Domain Type             | SQL Type | Strategy                                  |
//! |-------------------------|----------|-------------------------------------------|
//! | BookId, LoanId, UserId  | TEXT     | UUID string via `to_string()` / `FromStr` |
//! | DateTime<Utc>           | TEXT     | RFC 3339, UTC, microseconds               |
//! | LoanStatus, RecordStatus| TEXT     | `as_str()` / `FromStr`                    |
//! | counts                  | INTEGER  | `i64`, range-checked into `u32`           |

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use libris_core::domain::{
    Availability, BookId, Loan, LoanId, LoanRecord, LoanStatus, RecordStatus, Title, UserId,
};

use crate::CacheError;

// ============================================================================
// Scalar conversions
// ============================================================================

/// Formats a timestamp so that string order matches time order
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, CacheError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

fn parse_field<T>(column: &str, s: &str) -> Result<T, CacheError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    s.parse().map_err(|e: T::Err| {
        CacheError::SerializationError(format!("Invalid {} '{}': {}", column, s, e))
    })
}

pub(crate) fn to_count(column: &str, value: i64) -> Result<u32, CacheError> {
    u32::try_from(value).map_err(|_| {
        CacheError::SerializationError(format!("{} out of range: {}", column, value))
    })
}

// ============================================================================
// Row mapping functions
// ============================================================================

pub(crate) fn availability_from_row(row: &SqliteRow) -> Result<Availability, CacheError> {
    let total = to_count("total", row.get("total"))?;
    let available = to_count("available", row.get("available"))?;
    Availability::new(total, available).map_err(|e| CacheError::SerializationError(e.to_string()))
}

pub(crate) fn title_from_row(row: &SqliteRow) -> Result<Title, CacheError> {
    let id: String = row.get("id");
    let record_status: String = row.get("record_status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Title::with_fields(
        parse_field::<BookId>("id", &id)?,
        row.get("name"),
        row.get("author"),
        row.get("isbn"),
        availability_from_row(row)?,
        parse_field::<RecordStatus>("record_status", &record_status)?,
        parse_datetime(&created_at)?,
        parse_datetime(&updated_at)?,
    ))
}

pub(crate) fn loan_from_row(row: &SqliteRow) -> Result<Loan, CacheError> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let book_id: String = row.get("book_id");
    let borrowed_at: String = row.get("borrowed_at");
    let due_at: String = row.get("due_at");
    let returned_at: Option<String> = row.get("returned_at");
    let status: String = row.get("status");
    let record_status: String = row.get("record_status");

    Ok(Loan::with_fields(
        parse_field::<LoanId>("id", &id)?,
        parse_field::<UserId>("user_id", &user_id)?,
        parse_field::<BookId>("book_id", &book_id)?,
        parse_datetime(&borrowed_at)?,
        parse_datetime(&due_at)?,
        parse_optional_datetime(returned_at)?,
        parse_field::<LoanStatus>("status", &status)?,
        to_count("renewals", row.get("renewals"))?,
        parse_field::<RecordStatus>("record_status", &record_status)?,
    ))
}

/// Maps a `loans` row carrying the `book_*` columns of a titles join
pub(crate) fn loan_record_from_row(row: &SqliteRow) -> Result<LoanRecord, CacheError> {
    Ok(LoanRecord::new(
        loan_from_row(row)?,
        row.get("book_name"),
        row.get("book_author"),
        row.get("book_isbn"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, TimeZone};

    #[test]
    fn datetime_round_trips_at_microsecond_precision() {
        let dt = Utc::now().trunc_subsecs(6);
        assert_eq!(parse_datetime(&format_datetime(&dt)).unwrap(), dt);
    }

    #[test]
    fn formatted_datetimes_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2026, 9, 30, 23, 59, 59).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(format_datetime(&earlier) < format_datetime(&later));
        assert!(format_datetime(&earlier).ends_with('Z'));
    }

    #[test]
    fn garbage_datetime_is_a_serialization_error() {
        assert!(matches!(
            parse_datetime("yesterday"),
            Err(CacheError::SerializationError(_))
        ));
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(to_count("available", -1).is_err());
        assert_eq!(to_count("available", 4).unwrap(), 4);
    }
}
