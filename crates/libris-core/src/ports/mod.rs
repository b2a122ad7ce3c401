//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The domain core depends on these interfaces;
//! their implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IInventoryStore`] - Per-title copy counts with atomic adjustment
//! - [`ILoanLedger`] - Loan records and their lifecycle writes
//! - [`ILendingStore`] - Transactions spanning both of the above
//! - [`ICatalog`] - Catalog maintenance owned by an external collaborator

pub mod catalog;
pub mod inventory_store;
pub mod lending_store;
pub mod loan_ledger;

pub use catalog::ICatalog;
pub use inventory_store::IInventoryStore;
pub use lending_store::{ILendingStore, ILendingTransaction};
pub use loan_ledger::{ILoanLedger, LoanFilter};
