//! Lending store port: both stores under one transaction
//!
//! Borrow and return each write to the inventory store and the loan ledger.
//! [`ILendingStore::begin`] opens a unit of work that exposes both ports and
//! commits their writes together. Dropping an uncommitted transaction rolls
//! it back, so a cancelled caller never leaves one half applied.

use crate::domain::StorageError;

use super::{IInventoryStore, ILoanLedger};

/// A unit of work spanning the inventory store and the loan ledger
///
/// Reads through the transaction observe its own uncommitted writes.
#[async_trait::async_trait]
pub trait ILendingTransaction: IInventoryStore + ILoanLedger {
    /// Makes every write of this transaction visible atomically
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

/// Port trait for the persistent lending state
#[async_trait::async_trait]
pub trait ILendingStore: Send + Sync {
    /// Opens a new transaction
    async fn begin(&self) -> Result<Box<dyn ILendingTransaction>, StorageError>;

    /// Non-transactional inventory reads and single-statement updates
    fn inventory(&self) -> &dyn IInventoryStore;

    /// Non-transactional ledger reads and single-statement updates
    fn ledger(&self) -> &dyn ILoanLedger;
}
