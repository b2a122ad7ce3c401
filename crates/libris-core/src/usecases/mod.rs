//! Use cases (application layer)
//!
//! The use cases coordinate the ports on behalf of callers:
//!
//! - [`LoanEngine`] - borrow, return, renew and the loan listings
//! - [`EntityLocks`] - keyed async mutexes used by the engine

pub mod entity_locks;
pub mod loan_engine;

pub use entity_locks::{EntityGuard, EntityLocks};
pub use loan_engine::{LoanEngine, RetryPolicy};
