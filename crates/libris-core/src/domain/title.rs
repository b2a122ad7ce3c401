//! Catalog title entity
//!
//! A [`Title`] is a catalog entry together with its copy counts. The
//! available count is derived state: it always equals total copies minus
//! the number of ACTIVE loans, and only the inventory store mutates it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{errors::DomainError, loan::ledger_now, newtypes::BookId};

/// Visibility of a retained record
///
/// Titles and loans are never hard-deleted. A deleted record stays in the
/// store for history but every read path skips it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Live,
    Deleted,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Live => "live",
            RecordStatus::Deleted => "deleted",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, RecordStatus::Live)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(RecordStatus::Live),
            "deleted" => Ok(RecordStatus::Deleted),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown record status: {other}"
            ))),
        }
    }
}

/// Snapshot of a title's copy counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    total: u32,
    available: u32,
}

impl Availability {
    /// Creates a snapshot, rejecting `available > total`
    pub fn new(total: u32, available: u32) -> Result<Self, DomainError> {
        if available > total {
            return Err(DomainError::ValidationFailed(format!(
                "available copies ({available}) exceed total copies ({total})"
            )));
        }
        Ok(Self { total, available })
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    /// Copies currently out on active loans
    pub fn on_loan(&self) -> u32 {
        self.total - self.available
    }

    pub fn is_in_stock(&self) -> bool {
        self.available > 0
    }

    /// Applies `delta` to the available count, or `None` if it leaves `0..=total`
    pub fn apply(&self, delta: i64) -> Option<Self> {
        let next = i64::from(self.available).checked_add(delta)?;
        if next < 0 || next > i64::from(self.total) {
            return None;
        }
        Some(Self {
            total: self.total,
            available: u32::try_from(next).ok()?,
        })
    }
}

/// A catalog entry and its copy counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    id: BookId,
    name: String,
    author: String,
    isbn: Option<String>,
    availability: Availability,
    record_status: RecordStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Title {
    /// Creates a new title with every copy available
    pub fn new(
        name: impl Into<String>,
        author: impl Into<String>,
        isbn: Option<String>,
        total_copies: u32,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "title name must not be empty".to_string(),
            ));
        }
        let now = ledger_now();
        Ok(Self {
            id: BookId::new(),
            name,
            author: author.into(),
            isbn: isbn.filter(|s| !s.trim().is_empty()),
            availability: Availability {
                total: total_copies,
                available: total_copies,
            },
            record_status: RecordStatus::Live,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstructs a title from stored fields
    #[allow(clippy::too_many_arguments)]
    pub fn with_fields(
        id: BookId,
        name: String,
        author: String,
        isbn: Option<String>,
        availability: Availability,
        record_status: RecordStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            author,
            isbn,
            availability,
            record_status,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &BookId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn isbn(&self) -> Option<&str> {
        self.isbn.as_deref()
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn total_copies(&self) -> u32 {
        self.availability.total
    }

    pub fn available_copies(&self) -> u32 {
        self.availability.available
    }

    pub fn record_status(&self) -> RecordStatus {
        self.record_status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_title_has_all_copies_available() {
        let title = Title::new("Dune", "Frank Herbert", None, 4).unwrap();
        assert_eq!(title.total_copies(), 4);
        assert_eq!(title.available_copies(), 4);
        assert!(title.record_status().is_live());
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Title::new("  ", "anon", None, 1).is_err());
    }

    #[test]
    fn blank_isbn_is_dropped() {
        let title = Title::new("Dune", "Frank Herbert", Some(" ".into()), 1).unwrap();
        assert_eq!(title.isbn(), None);
    }

    #[test]
    fn apply_stays_within_bounds() {
        let a = Availability::new(2, 1).unwrap();
        assert_eq!(a.apply(-1).unwrap().available(), 0);
        assert_eq!(a.apply(1).unwrap().available(), 2);
        assert!(a.apply(-2).is_none());
        assert!(a.apply(2).is_none());
    }

    #[test]
    fn on_loan_is_total_minus_available() {
        let a = Availability::new(5, 2).unwrap();
        assert_eq!(a.on_loan(), 3);
        assert!(a.is_in_stock());
        assert!(!Availability::new(1, 0).unwrap().is_in_stock());
    }

    #[test]
    fn availability_rejects_more_available_than_total() {
        assert!(Availability::new(1, 2).is_err());
    }

    #[test]
    fn record_status_roundtrip() {
        for status in [RecordStatus::Live, RecordStatus::Deleted] {
            assert_eq!(status.as_str().parse::<RecordStatus>().unwrap(), status);
        }
        assert!("gone".parse::<RecordStatus>().is_err());
    }
}
