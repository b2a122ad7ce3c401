//! SQLite implementation of ILendingStore
//!
//! A [`SqliteLendingTransaction`] owns one `sqlx` transaction. Dropping it
//! without calling `commit` rolls the transaction back, which is what makes
//! a cancelled borrow or return leave no trace.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;

use libris_core::domain::{
    Availability, BookId, InventoryError, LedgerError, Loan, LoanId, LoanPolicy, LoanRecord,
    Page, PageRequest, StorageError, Title, UserId,
};
use libris_core::ports::{IInventoryStore, ILendingStore, ILendingTransaction, ILoanLedger, LoanFilter};

use crate::inventory::{self, SqliteInventoryStore};
use crate::ledger::{self, SqliteLoanLedger};
use crate::storage_error;

/// Lending state stored in one SQLite database
#[derive(Clone)]
pub struct SqliteLendingStore {
    pool: SqlitePool,
    inventory: SqliteInventoryStore,
    ledger: SqliteLoanLedger,
}

impl SqliteLendingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            inventory: SqliteInventoryStore::new(pool.clone()),
            ledger: SqliteLoanLedger::new(pool.clone()),
            pool,
        }
    }
}

/// Takes the database write lock before anything is read
///
/// A deferred transaction that reads first and writes later fails with
/// SQLITE_BUSY_SNAPSHOT when another writer commits in between. Starting
/// with a write makes competing writers queue on the busy timeout instead.
pub(crate) async fn reserve_writer(conn: &mut SqliteConnection) -> Result<(), StorageError> {
    sqlx::query("UPDATE titles SET id = id WHERE 0")
        .execute(conn)
        .await
        .map_err(storage_error)?;
    Ok(())
}

#[async_trait::async_trait]
impl ILendingStore for SqliteLendingStore {
    async fn begin(&self) -> Result<Box<dyn ILendingTransaction>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        reserve_writer(&mut tx).await?;
        tracing::trace!("Lending transaction started");
        Ok(Box::new(SqliteLendingTransaction {
            tx: Mutex::new(tx),
        }))
    }

    fn inventory(&self) -> &dyn IInventoryStore {
        &self.inventory
    }

    fn ledger(&self) -> &dyn ILoanLedger {
        &self.ledger
    }
}

/// An open lending transaction
pub struct SqliteLendingTransaction {
    tx: Mutex<Transaction<'static, Sqlite>>,
}

#[async_trait::async_trait]
impl ILendingTransaction for SqliteLendingTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.into_inner().commit().await.map_err(storage_error)?;
        tracing::trace!("Lending transaction committed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl IInventoryStore for SqliteLendingTransaction {
    async fn get_title(&self, book_id: &BookId) -> Result<Title, InventoryError> {
        let mut tx = self.tx.lock().await;
        inventory::get_title(&mut tx, book_id).await
    }

    async fn get_availability(&self, book_id: &BookId) -> Result<Availability, InventoryError> {
        let mut tx = self.tx.lock().await;
        inventory::get_availability(&mut tx, book_id).await
    }

    async fn adjust_availability(
        &self,
        book_id: &BookId,
        delta: i64,
    ) -> Result<Availability, InventoryError> {
        let mut tx = self.tx.lock().await;
        inventory::adjust_availability(&mut tx, book_id, delta).await
    }
}

#[async_trait::async_trait]
impl ILoanLedger for SqliteLendingTransaction {
    async fn create_loan(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        policy: &LoanPolicy,
    ) -> Result<Loan, LedgerError> {
        let mut tx = self.tx.lock().await;
        ledger::create_loan(&mut tx, user_id, book_id, policy).await
    }

    async fn close_loan(&self, loan_id: &LoanId) -> Result<Loan, LedgerError> {
        let mut tx = self.tx.lock().await;
        ledger::close_loan(&mut tx, loan_id).await
    }

    async fn extend_loan(&self, loan_id: &LoanId, policy: &LoanPolicy) -> Result<Loan, LedgerError> {
        let mut tx = self.tx.lock().await;
        ledger::extend_loan(&mut tx, loan_id, policy).await
    }

    async fn get_loan(&self, loan_id: &LoanId) -> Result<Loan, LedgerError> {
        let mut tx = self.tx.lock().await;
        ledger::get_loan(&mut tx, loan_id).await
    }

    async fn find_active_loan(
        &self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<Option<Loan>, LedgerError> {
        let mut tx = self.tx.lock().await;
        ledger::find_active_loan(&mut tx, user_id, book_id).await
    }

    async fn list_loans(
        &self,
        filter: &LoanFilter,
        page: &PageRequest,
    ) -> Result<Page<LoanRecord>, LedgerError> {
        let mut tx = self.tx.lock().await;
        ledger::list_loans(&mut tx, filter, page).await
    }

    async fn active_loan_count(&self, book_id: &BookId) -> Result<u32, LedgerError> {
        let mut tx = self.tx.lock().await;
        ledger::active_loan_count(&mut tx, book_id).await
    }

    async fn soft_delete_loan(&self, loan_id: &LoanId) -> Result<(), LedgerError> {
        let mut tx = self.tx.lock().await;
        ledger::soft_delete_loan(&mut tx, loan_id).await
    }
}
