//! Loan domain entity
//!
//! A [`Loan`] is one borrow-to-return lifecycle for a (user, title) pair:
//!
//! ```text
//! (none) --borrow--> ACTIVE --return--> CLOSED
//!                     |  ^
//!                     +--+ renew (while renewals < limit)
//! ```
//!
//! CLOSED is terminal. The only change a closed loan still accepts is the
//! soft-delete flag.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::{
    errors::DomainError,
    newtypes::{BookId, LoanId, UserId},
    policy::LoanPolicy,
    title::RecordStatus,
};

/// Current time truncated to the microsecond precision the ledger persists
///
/// Loans are stamped with this so a reloaded loan compares equal to the one
/// returned by the operation that wrote it.
pub fn ledger_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Lifecycle status of a loan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Copy is out with the borrower
    #[default]
    Active,
    /// Copy has been returned
    Closed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Closed => "closed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::Active)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(LoanStatus::Active),
            "closed" => Ok(LoanStatus::Closed),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown loan status: {other}"
            ))),
        }
    }
}

/// A single loan record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    id: LoanId,
    user_id: UserId,
    book_id: BookId,
    borrowed_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    returned_at: Option<DateTime<Utc>>,
    status: LoanStatus,
    renewals: u32,
    record_status: RecordStatus,
}

impl Loan {
    /// Opens a new ACTIVE loan borrowed at `now`
    pub fn open(user_id: UserId, book_id: BookId, policy: &LoanPolicy, now: DateTime<Utc>) -> Self {
        Self {
            id: LoanId::new(),
            user_id,
            book_id,
            borrowed_at: now,
            due_at: policy.due_after(now),
            returned_at: None,
            status: LoanStatus::Active,
            renewals: 0,
            record_status: RecordStatus::Live,
        }
    }

    /// Reconstructs a loan from stored fields
    #[allow(clippy::too_many_arguments)]
    pub fn with_fields(
        id: LoanId,
        user_id: UserId,
        book_id: BookId,
        borrowed_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
        returned_at: Option<DateTime<Utc>>,
        status: LoanStatus,
        renewals: u32,
        record_status: RecordStatus,
    ) -> Self {
        Self {
            id,
            user_id,
            book_id,
            borrowed_at,
            due_at,
            returned_at,
            status,
            renewals,
            record_status,
        }
    }

    pub fn id(&self) -> &LoanId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn book_id(&self) -> &BookId {
        &self.book_id
    }

    pub fn borrowed_at(&self) -> DateTime<Utc> {
        self.borrowed_at
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    pub fn renewals(&self) -> u32 {
        self.renewals
    }

    pub fn record_status(&self) -> RecordStatus {
        self.record_status
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns true if the loan is still out after its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now > self.due_at
    }

    /// ACTIVE -> CLOSED
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::InvalidState {
                from: self.status.to_string(),
                to: LoanStatus::Closed.to_string(),
            });
        }
        self.status = LoanStatus::Closed;
        self.returned_at = Some(now);
        Ok(())
    }

    /// ACTIVE -> ACTIVE, pushing the due date out by one loan period
    pub fn renew(&mut self, policy: &LoanPolicy) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::InvalidState {
                from: self.status.to_string(),
                to: "renewed".to_string(),
            });
        }
        if !policy.can_renew(self.renewals) {
            return Err(DomainError::ValidationFailed(format!(
                "renewal limit of {} reached",
                policy.max_renewals()
            )));
        }
        self.due_at = policy.due_after(self.due_at);
        self.renewals += 1;
        Ok(())
    }

    /// Hides a closed loan from read paths
    pub fn soft_delete(&mut self) -> Result<(), DomainError> {
        if self.is_active() {
            return Err(DomainError::InvalidState {
                from: self.status.to_string(),
                to: RecordStatus::Deleted.to_string(),
            });
        }
        self.record_status = RecordStatus::Deleted;
        Ok(())
    }
}

/// A loan joined with the catalog details of its title
///
/// Listing views carry these so a reader sees what was borrowed, not just a
/// book id. The title fields are `None` when the title row is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    #[serde(flatten)]
    loan: Loan,
    book_name: Option<String>,
    book_author: Option<String>,
    book_isbn: Option<String>,
}

impl LoanRecord {
    pub fn new(
        loan: Loan,
        book_name: Option<String>,
        book_author: Option<String>,
        book_isbn: Option<String>,
    ) -> Self {
        Self {
            loan,
            book_name,
            book_author,
            book_isbn,
        }
    }

    pub fn loan(&self) -> &Loan {
        &self.loan
    }

    pub fn into_loan(self) -> Loan {
        self.loan
    }

    pub fn book_name(&self) -> Option<&str> {
        self.book_name.as_deref()
    }

    pub fn book_author(&self) -> Option<&str> {
        self.book_author.as_deref()
    }

    pub fn book_isbn(&self) -> Option<&str> {
        self.book_isbn.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_loan() -> Loan {
        Loan::open(UserId::new(), BookId::new(), &LoanPolicy::default(), ledger_now())
    }

    #[test]
    fn open_loan_is_active_and_due_in_thirty_days() {
        let loan = open_loan();
        assert!(loan.is_active());
        assert_eq!(loan.renewals(), 0);
        assert_eq!(loan.returned_at(), None);
        assert_eq!(loan.due_at() - loan.borrowed_at(), Duration::days(30));
    }

    #[test]
    fn close_sets_return_time_once() {
        let mut loan = open_loan();
        let now = ledger_now();
        loan.close(now).unwrap();
        assert_eq!(loan.status(), LoanStatus::Closed);
        assert_eq!(loan.returned_at(), Some(now));

        let err = loan.close(ledger_now()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
        assert_eq!(loan.returned_at(), Some(now));
    }

    #[test]
    fn renew_extends_due_date_until_limit() {
        let policy = LoanPolicy::default();
        let mut loan = open_loan();
        let mut due = loan.due_at();
        for expected in 1..=3 {
            loan.renew(&policy).unwrap();
            assert_eq!(loan.renewals(), expected);
            assert_eq!(loan.due_at() - due, Duration::days(30));
            due = loan.due_at();
        }
        assert!(loan.renew(&policy).is_err());
        assert_eq!(loan.renewals(), 3);
        assert_eq!(loan.due_at(), due);
    }

    #[test]
    fn closed_loan_cannot_be_renewed() {
        let mut loan = open_loan();
        loan.close(ledger_now()).unwrap();
        assert!(loan.renew(&LoanPolicy::default()).is_err());
    }

    #[test]
    fn only_closed_loans_can_be_soft_deleted() {
        let mut loan = open_loan();
        assert!(loan.soft_delete().is_err());
        loan.close(ledger_now()).unwrap();
        loan.soft_delete().unwrap();
        assert_eq!(loan.record_status(), RecordStatus::Deleted);
    }

    #[test]
    fn overdue_only_while_active() {
        let mut loan = open_loan();
        let later = loan.due_at() + Duration::days(1);
        assert!(loan.is_overdue(later));
        loan.close(ledger_now()).unwrap();
        assert!(!loan.is_overdue(later));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("ACTIVE".parse::<LoanStatus>().unwrap(), LoanStatus::Active);
        assert_eq!("closed".parse::<LoanStatus>().unwrap(), LoanStatus::Closed);
        assert!("borrowed".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn loan_record_serializes_flat() {
        let loan = open_loan();
        let record = LoanRecord::new(loan.clone(), Some("Dune".into()), Some("Frank Herbert".into()), None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], loan.id().to_string());
        assert_eq!(json["book_name"], "Dune");
        assert!(json["book_isbn"].is_null());
        assert_eq!(record.into_loan(), loan);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&LoanStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");
    }
}
