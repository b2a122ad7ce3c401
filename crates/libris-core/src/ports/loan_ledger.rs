//! Loan ledger port (driven/secondary port)
//!
//! One record per loan, keyed by loan id. Records are retained forever;
//! closed loans can only be hidden through the soft-delete flag.
//!
//! ## Design Notes
//!
//! - `create_loan` must check-and-insert atomically: two concurrent creations
//!   for the same (user, book) pair yield one loan and one `Conflict`.
//! - `extend_loan` is a compare-and-swap on the renewal count it observed;
//!   losing the race surfaces as `StorageError::Busy`.
//! - The `LoanFilter` struct provides a composable query mechanism
//!   without exposing storage implementation details.

use crate::domain::{
    BookId, LedgerError, Loan, LoanId, LoanPolicy, LoanRecord, LoanStatus, Page, PageRequest,
    UserId,
};

/// Filter criteria for listing loans
///
/// All fields are optional; when `None`, no filtering is applied for that field.
/// Multiple filters are combined with AND logic. Soft-deleted loans are
/// never returned.
///
/// # Example
///
/// ```
/// use libris_core::domain::{LoanStatus, UserId};
/// use libris_core::ports::LoanFilter;
///
/// // A patron's loans that are still out
/// let filter = LoanFilter::new()
///     .with_user_id(UserId::new())
///     .with_status(LoanStatus::Active);
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanFilter {
    /// Filter by borrowing user
    pub user_id: Option<UserId>,
    /// Filter by borrowed title
    pub book_id: Option<BookId>,
    /// Filter by lifecycle status
    pub status: Option<LoanStatus>,
}

impl LoanFilter {
    /// Creates a new empty filter (matches all live loans)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_book_id(mut self, book_id: BookId) -> Self {
        self.book_id = Some(book_id);
        self
    }

    pub fn with_status(mut self, status: LoanStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.book_id.is_none() && self.status.is_none()
    }
}

/// Port trait for loan records
#[async_trait::async_trait]
pub trait ILoanLedger: Send + Sync {
    /// Inserts a new ACTIVE loan borrowed now and due one loan period later
    ///
    /// Fails with `LedgerError::Conflict` if the pair already has an ACTIVE loan.
    async fn create_loan(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        policy: &LoanPolicy,
    ) -> Result<Loan, LedgerError>;

    /// Closes an ACTIVE loan, stamping the return time
    async fn close_loan(&self, loan_id: &LoanId) -> Result<Loan, LedgerError>;

    /// Adds one loan period to the due date and increments the renewal count
    async fn extend_loan(&self, loan_id: &LoanId, policy: &LoanPolicy)
        -> Result<Loan, LedgerError>;

    /// Retrieves a live loan by id
    async fn get_loan(&self, loan_id: &LoanId) -> Result<Loan, LedgerError>;

    /// Retrieves the ACTIVE loan of a (user, book) pair, if any
    async fn find_active_loan(
        &self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<Option<Loan>, LedgerError>;

    /// Lists live loans matching `filter`, newest borrow first, each joined
    /// with its title's name, author and ISBN
    async fn list_loans(
        &self,
        filter: &LoanFilter,
        page: &PageRequest,
    ) -> Result<Page<LoanRecord>, LedgerError>;

    /// Counts ACTIVE loans referencing a title
    async fn active_loan_count(&self, book_id: &BookId) -> Result<u32, LedgerError>;

    /// Hides a CLOSED loan from read paths
    ///
    /// Fails with `LedgerError::Invalid` if the loan is still ACTIVE.
    async fn soft_delete_loan(&self, loan_id: &LoanId) -> Result<(), LedgerError>;
}
