//! Loan engine use case
//!
//! Orchestrates borrow, return and renew against the inventory store and
//! the loan ledger. Each operation:
//!
//! 1. Takes the keyed locks of the entities it touches (loan before book)
//! 2. Opens one lending transaction and performs every check and write in it
//! 3. Commits, or drops the transaction so nothing is applied
//!
//! The locks serialise competing callers inside this process; the store
//! transaction keeps the two writes atomic and guards against writers in
//! other processes. Storage contention is retried a bounded number of times.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::LendingConfig;
use crate::domain::{
    Availability, BookId, DomainError, Loan, LoanError, LoanId, LoanPolicy, LoanRecord,
    LoanStatus, Page, PageRequest, UserId,
};
use crate::ports::{ILendingStore, LoanFilter};

use super::entity_locks::EntityLocks;

/// How often and how patiently storage contention is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff: Duration::from_millis(10),
        }
    }
}

/// The borrowing/inventory consistency engine
pub struct LoanEngine {
    store: Arc<dyn ILendingStore>,
    policy: LoanPolicy,
    retry: RetryPolicy,
    max_page_size: u32,
    book_locks: EntityLocks<BookId>,
    loan_locks: EntityLocks<LoanId>,
}

impl LoanEngine {
    /// Creates an engine with the default policy, retry settings and page limit
    pub fn new(store: Arc<dyn ILendingStore>) -> Self {
        Self {
            store,
            policy: LoanPolicy::default(),
            retry: RetryPolicy::default(),
            max_page_size: 100,
            book_locks: EntityLocks::new(),
            loan_locks: EntityLocks::new(),
        }
    }

    /// Creates an engine configured from the `lending` configuration section
    pub fn from_config(
        store: Arc<dyn ILendingStore>,
        config: &LendingConfig,
    ) -> Result<Self, DomainError> {
        Ok(Self::new(store)
            .with_policy(config.policy()?)
            .with_retry(config.retry_policy())
            .with_max_page_size(config.max_page_size))
    }

    pub fn with_policy(mut self, policy: LoanPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    // ------------------------------------------------------------------
    // Write operations
    // ------------------------------------------------------------------

    /// Lends one copy of `book_id` to `user_id`
    ///
    /// # Errors
    ///
    /// - `BookNotFound` if the title does not exist
    /// - `OutOfStock` if no copy is available
    /// - `AlreadyBorrowed` if the user already has this title on an active loan
    pub async fn borrow(&self, user_id: &UserId, book_id: &BookId) -> Result<Loan, LoanError> {
        let _book = self.book_locks.lock(book_id).await;

        let loan = self
            .retrying("borrow", || self.borrow_once(user_id, book_id))
            .await?;

        info!(
            loan_id = %loan.id(),
            user_id = %user_id,
            book_id = %book_id,
            due_at = %loan.due_at(),
            "Book borrowed"
        );
        Ok(loan)
    }

    /// Closes a loan and puts its copy back on the shelf
    ///
    /// # Errors
    ///
    /// - `LoanNotFound` if the loan does not exist
    /// - `AlreadyReturned` if the loan is already closed
    pub async fn return_loan(&self, loan_id: &LoanId) -> Result<Loan, LoanError> {
        let _loan = self.loan_locks.lock(loan_id).await;

        let current = self.store.ledger().get_loan(loan_id).await?;
        if !current.is_active() {
            return Err(LoanError::AlreadyReturned(*loan_id));
        }
        let book_id = *current.book_id();
        let _book = self.book_locks.lock(&book_id).await;

        let loan = self
            .retrying("return", || self.return_once(loan_id, &book_id))
            .await?;

        info!(
            loan_id = %loan_id,
            user_id = %loan.user_id(),
            book_id = %book_id,
            "Book returned"
        );
        Ok(loan)
    }

    /// Extends an active loan by one loan period
    ///
    /// # Errors
    ///
    /// - `LoanNotFound` if the loan does not exist
    /// - `AlreadyReturned` if the loan is closed
    /// - `RenewalLimitExceeded` once the renewal limit has been used up
    pub async fn renew(&self, loan_id: &LoanId) -> Result<Loan, LoanError> {
        let _loan = self.loan_locks.lock(loan_id).await;

        let loan = self
            .retrying("renew", || self.renew_once(loan_id))
            .await?;

        info!(
            loan_id = %loan_id,
            renewals = loan.renewals(),
            due_at = %loan.due_at(),
            "Loan renewed"
        );
        Ok(loan)
    }

    // ------------------------------------------------------------------
    // Read operations
    // ------------------------------------------------------------------

    /// A user's loans with their titles, newest borrow first
    pub async fn history(
        &self,
        user_id: &UserId,
        page: &PageRequest,
    ) -> Result<Page<LoanRecord>, LoanError> {
        self.list_loans(&LoanFilter::new().with_user_id(*user_id), page)
            .await
    }

    /// A user's loans that are still out, newest borrow first
    pub async fn current_loans(
        &self,
        user_id: &UserId,
        page: &PageRequest,
    ) -> Result<Page<LoanRecord>, LoanError> {
        let filter = LoanFilter::new()
            .with_user_id(*user_id)
            .with_status(LoanStatus::Active);
        self.list_loans(&filter, page).await
    }

    /// Administrative listing over all live loans
    pub async fn list_loans(
        &self,
        filter: &LoanFilter,
        page: &PageRequest,
    ) -> Result<Page<LoanRecord>, LoanError> {
        if page.size() > self.max_page_size {
            return Err(DomainError::ValidationFailed(format!(
                "page size {} exceeds the maximum of {}",
                page.size(),
                self.max_page_size
            ))
            .into());
        }
        Ok(self.store.ledger().list_loans(filter, page).await?)
    }

    /// Retrieves a single loan
    pub async fn get_loan(&self, loan_id: &LoanId) -> Result<Loan, LoanError> {
        Ok(self.store.ledger().get_loan(loan_id).await?)
    }

    /// Current copy counts of a title
    pub async fn availability(&self, book_id: &BookId) -> Result<Availability, LoanError> {
        Ok(self.store.inventory().get_availability(book_id).await?)
    }

    // ------------------------------------------------------------------
    // Single attempts
    // ------------------------------------------------------------------

    async fn borrow_once(&self, user_id: &UserId, book_id: &BookId) -> Result<Loan, LoanError> {
        let tx = self.store.begin().await?;

        let availability = tx.get_availability(book_id).await?;
        if !availability.is_in_stock() {
            return Err(LoanError::OutOfStock(*book_id));
        }
        if tx.find_active_loan(user_id, book_id).await?.is_some() {
            return Err(LoanError::AlreadyBorrowed {
                user_id: *user_id,
                book_id: *book_id,
            });
        }

        let loan = tx.create_loan(user_id, book_id, &self.policy).await?;
        let after = tx.adjust_availability(book_id, -1).await?;
        tx.commit().await?;

        debug!(
            book_id = %book_id,
            available = after.available(),
            total = after.total(),
            "Inventory decremented"
        );
        Ok(loan)
    }

    async fn return_once(&self, loan_id: &LoanId, book_id: &BookId) -> Result<Loan, LoanError> {
        let tx = self.store.begin().await?;

        let loan = tx.close_loan(loan_id).await?;
        let after = tx.adjust_availability(book_id, 1).await?;
        tx.commit().await?;

        debug!(
            book_id = %book_id,
            available = after.available(),
            total = after.total(),
            "Inventory incremented"
        );
        Ok(loan)
    }

    async fn renew_once(&self, loan_id: &LoanId) -> Result<Loan, LoanError> {
        let tx = self.store.begin().await?;

        let current = tx.get_loan(loan_id).await?;
        if !current.is_active() {
            return Err(LoanError::AlreadyReturned(*loan_id));
        }
        if !self.policy.can_renew(current.renewals()) {
            return Err(LoanError::RenewalLimitExceeded {
                loan_id: *loan_id,
                limit: self.policy.max_renewals(),
            });
        }

        let loan = tx.extend_loan(loan_id, &self.policy).await?;
        tx.commit().await?;
        Ok(loan)
    }

    /// Runs `attempt` until it succeeds, fails for a non-contention reason,
    /// or the retry budget is spent
    async fn retrying<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, LoanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LoanError>>,
    {
        let mut retries_left = self.retry.retries;
        loop {
            match attempt().await {
                Err(LoanError::Conflict(reason)) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!(
                        operation,
                        reason = %reason,
                        retries_left,
                        "Storage contention, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                other => return other,
            }
        }
    }
}
