//! Libris Core - Lending domain and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Title`, `Loan`, `LoanPolicy`, paging types
//! - **Use cases** - `LoanEngine` (borrow / return / renew / history)
//! - **Port definitions** - `IInventoryStore`, `ILoanLedger`, `ILendingStore`, `ICatalog`
//!
//! # Architecture
//!
//! The domain module holds pure business rules with no I/O.
//! Ports define the trait interfaces that the storage adapters implement.
//! The loan engine orchestrates both stores through those ports and owns
//! the cross-store consistency guarantees.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
