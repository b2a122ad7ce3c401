//! Libris Cache - SQLite persistence
//!
//! SQLite-based storage for:
//! - Titles and their copy counts (inventory store, catalog)
//! - Loan records (loan ledger)
//!
//! ## Architecture
//!
//! This crate implements the `IInventoryStore`, `ILoanLedger`,
//! `ILendingStore` and `ICatalog` ports from `libris-core` using SQLite as
//! the storage backend. It is a driven (secondary) adapter in the hexagonal
//! architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteLendingStore`] - Inventory and ledger under one transaction
//! - [`SqliteCatalog`] - Title maintenance
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use libris_cache::{DatabasePool, SqliteLendingStore};
//! use libris_core::usecases::LoanEngine;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/libris/libris.db")).await?;
//! let engine = LoanEngine::new(Arc::new(SqliteLendingStore::new(pool.pool().clone())));
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod inventory;
pub mod ledger;
pub mod lending;
pub mod pool;
mod rows;

pub use catalog::SqliteCatalog;
pub use inventory::SqliteInventoryStore;
pub use ledger::SqliteLoanLedger;
pub use lending::{SqliteLendingStore, SqliteLendingTransaction};
pub use pool::DatabasePool;

use libris_core::domain::StorageError;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The database is locked by another writer
    #[error("Database busy: {0}")]
    Busy(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped back to a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// SQLite result codes that mean "try again later"
///
/// SQLITE_BUSY, SQLITE_LOCKED and their extended codes, including
/// SQLITE_BUSY_SNAPSHOT (517) raised when a WAL read snapshot cannot be
/// upgraded to a write.
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517"];

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut => CacheError::Busy(e.to_string()),
            sqlx::Error::Database(db)
                if db.code().is_some_and(|code| BUSY_CODES.contains(&code.as_ref())) =>
            {
                CacheError::Busy(db.message().to_string())
            }
            _ => CacheError::QueryFailed(e.to_string()),
        }
    }
}

impl From<CacheError> for StorageError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Busy(msg) => StorageError::Busy(msg),
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}

/// Classifies a driver error for the store ports
pub(crate) fn storage_error(e: sqlx::Error) -> StorageError {
    CacheError::from(e).into()
}

/// True if `e` is a UNIQUE or PRIMARY KEY constraint violation
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// True if `e` is a FOREIGN KEY constraint violation
pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
