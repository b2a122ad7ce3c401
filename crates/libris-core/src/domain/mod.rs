//! Domain entities and business logic
//!
//! This module contains the core domain types for Libris:
//! - Newtypes for type-safe identifiers
//! - Catalog titles and their copy counts
//! - Loans and the loan lifecycle state machine
//! - Lending policy limits
//! - Paging requests and result pages
//! - Domain and store error types

pub mod errors;
pub mod loan;
pub mod newtypes;
pub mod page;
pub mod policy;
pub mod title;

// Re-export commonly used types
pub use errors::{
    CatalogError, DomainError, InventoryError, LedgerError, LoanError, StorageError,
};
pub use loan::{ledger_now, Loan, LoanRecord, LoanStatus};
pub use newtypes::*;
pub use page::{Page, PageRequest};
pub use policy::LoanPolicy;
pub use title::{Availability, RecordStatus, Title};
