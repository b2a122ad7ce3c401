//! Domain error types
//!
//! Three layers of errors live here:
//! - [`DomainError`] for validation failures and invalid state transitions
//! - [`InventoryError`], [`LedgerError`] and [`StorageError`] returned by the store ports
//! - [`LoanError`], the taxonomy the loan engine reports to its callers

use thiserror::Error;

use super::newtypes::{BookId, LoanId, UserId};

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Failures of the persistence layer itself, independent of business rules
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Another writer holds the data or changed it underneath us; retry
    #[error("storage busy: {0}")]
    Busy(String),

    /// The store could not be reached or failed unexpectedly
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the inventory store port
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Title is absent or soft-deleted
    #[error("title not found: {0}")]
    NotFound(BookId),

    /// Applying the delta would leave `available` outside `0..=total`
    #[error("availability out of range for {book_id}: {available}/{total} with delta {delta}")]
    OutOfRange {
        book_id: BookId,
        total: u32,
        available: u32,
        delta: i64,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors returned by the loan ledger port
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("loan not found: {0}")]
    NotFound(LoanId),

    #[error("loan already closed: {0}")]
    AlreadyClosed(LoanId),

    /// An ACTIVE loan already exists for the (user, book) pair
    #[error("active loan already exists for user {user_id} and book {book_id}")]
    Conflict { user_id: UserId, book_id: BookId },

    #[error("renewal limit of {limit} reached for loan {loan_id}")]
    RenewalLimitExceeded { loan_id: LoanId, limit: u32 },

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors returned by the catalog collaborator port
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("title not found: {0}")]
    NotFound(BookId),

    /// Total copies may not drop below the number of copies out on loan
    #[error("book {book_id} has {active} copies on loan; total {total} is too low")]
    TotalBelowActive {
        book_id: BookId,
        total: u32,
        active: u32,
    },

    /// A title with copies out on loan cannot be deleted
    #[error("book {book_id} still has {active} active loans")]
    ActiveLoans { book_id: BookId, active: u32 },

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure taxonomy of the loan engine
///
/// Every variant is recoverable by the caller and carries enough context to
/// render a user-facing message. [`LoanError::is_retryable`] tells the
/// request layer whether repeating the same call may succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoanError {
    #[error("book {0} does not exist")]
    BookNotFound(BookId),

    #[error("loan {0} does not exist")]
    LoanNotFound(LoanId),

    #[error("no copies of book {0} are available")]
    OutOfStock(BookId),

    #[error("user {user_id} already has book {book_id} on loan")]
    AlreadyBorrowed { user_id: UserId, book_id: BookId },

    #[error("loan {0} has already been returned")]
    AlreadyReturned(LoanId),

    #[error("loan {loan_id} has reached the renewal limit of {limit}")]
    RenewalLimitExceeded { loan_id: LoanId, limit: u32 },

    /// Concurrent write detected and retries were exhausted
    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    /// Inventory counters would break `0 <= available <= total`; indicates a bug
    #[error("inventory invariant violated for book {book_id}: {available}/{total} with delta {delta}")]
    OutOfRange {
        book_id: BookId,
        total: u32,
        available: u32,
        delta: i64,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] DomainError),

    /// Transient storage failure; the operation had no effect and is safe to retry
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl LoanError {
    /// Stable machine-readable code for the request layer
    pub fn code(&self) -> &'static str {
        match self {
            LoanError::BookNotFound(_) | LoanError::LoanNotFound(_) => "not_found",
            LoanError::OutOfStock(_) => "out_of_stock",
            LoanError::AlreadyBorrowed { .. } => "already_borrowed",
            LoanError::AlreadyReturned(_) => "already_returned",
            LoanError::RenewalLimitExceeded { .. } => "renewal_limit_exceeded",
            LoanError::Conflict(_) => "conflict",
            LoanError::OutOfRange { .. } => "out_of_range",
            LoanError::InvalidRequest(_) => "invalid_request",
            LoanError::Unavailable(_) => "unavailable",
        }
    }

    /// Returns true if repeating the operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoanError::Conflict(_) | LoanError::Unavailable(_))
    }
}

impl From<StorageError> for LoanError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Busy(msg) => LoanError::Conflict(msg),
            StorageError::Unavailable(msg) => LoanError::Unavailable(msg),
        }
    }
}

impl From<InventoryError> for LoanError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::NotFound(book_id) => LoanError::BookNotFound(book_id),
            InventoryError::OutOfRange {
                book_id,
                total,
                available,
                delta,
            } => LoanError::OutOfRange {
                book_id,
                total,
                available,
                delta,
            },
            InventoryError::Storage(e) => e.into(),
        }
    }
}

impl From<LedgerError> for LoanError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(loan_id) => LoanError::LoanNotFound(loan_id),
            LedgerError::AlreadyClosed(loan_id) => LoanError::AlreadyReturned(loan_id),
            LedgerError::Conflict { user_id, book_id } => {
                LoanError::AlreadyBorrowed { user_id, book_id }
            }
            LedgerError::RenewalLimitExceeded { loan_id, limit } => {
                LoanError::RenewalLimitExceeded { loan_id, limit }
            }
            LedgerError::Invalid(e) => LoanError::InvalidRequest(e),
            LedgerError::Storage(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::ValidationFailed("page must be >= 1".to_string());
        assert_eq!(err.to_string(), "Validation failed: page must be >= 1");

        let err = DomainError::InvalidState {
            from: "closed".to_string(),
            to: "active".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid state transition from closed to active");
    }

    #[test]
    fn busy_storage_maps_to_retryable_conflict() {
        let err: LoanError = StorageError::Busy("database is locked".into()).into();
        assert!(matches!(err, LoanError::Conflict(_)));
        assert!(err.is_retryable());
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn unavailable_storage_is_retryable() {
        let err: LoanError = InventoryError::Storage(StorageError::Unavailable("io".into())).into();
        assert_eq!(err, LoanError::Unavailable("io".into()));
        assert!(err.is_retryable());
    }

    #[test]
    fn ledger_conflict_means_already_borrowed() {
        let user_id = UserId::new();
        let book_id = BookId::new();
        let err: LoanError = LedgerError::Conflict { user_id, book_id }.into();
        assert_eq!(err, LoanError::AlreadyBorrowed { user_id, book_id });
        assert!(!err.is_retryable());
    }

    #[test]
    fn closed_loan_maps_to_already_returned() {
        let loan_id = LoanId::new();
        let err: LoanError = LedgerError::AlreadyClosed(loan_id).into();
        assert_eq!(err, LoanError::AlreadyReturned(loan_id));
        assert_eq!(err.code(), "already_returned");
    }

    #[test]
    fn not_found_codes_are_shared() {
        assert_eq!(LoanError::BookNotFound(BookId::new()).code(), "not_found");
        assert_eq!(LoanError::LoanNotFound(LoanId::new()).code(), "not_found");
    }
}
