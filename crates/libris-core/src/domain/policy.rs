//! Lending policy limits
//!
//! The loan period and renewal limit come from configuration; the engine
//! and the ledger receive them as a [`LoanPolicy`] value.

use chrono::{DateTime, Duration, Utc};

use super::errors::DomainError;

/// Default number of days a loan runs before it is due
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 30;

/// Default number of renewals allowed per loan
pub const DEFAULT_MAX_RENEWALS: u32 = 3;

/// Loan period and renewal limit applied to every loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    loan_period: Duration,
    max_renewals: u32,
}

impl LoanPolicy {
    /// Creates a policy, rejecting a zero-length loan period
    pub fn new(loan_period_days: u32, max_renewals: u32) -> Result<Self, DomainError> {
        if loan_period_days == 0 {
            return Err(DomainError::ValidationFailed(
                "loan period must be at least one day".to_string(),
            ));
        }
        Ok(Self {
            loan_period: Duration::days(i64::from(loan_period_days)),
            max_renewals,
        })
    }

    /// Length of one loan period (also the extension applied by a renewal)
    pub fn loan_period(&self) -> Duration {
        self.loan_period
    }

    /// Maximum number of renewals per loan
    pub fn max_renewals(&self) -> u32 {
        self.max_renewals
    }

    /// Due date for a loan borrowed or renewed at `from`
    pub fn due_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from + self.loan_period
    }

    /// Returns true if a loan that has been renewed `renewals` times may be renewed again
    pub fn can_renew(&self, renewals: u32) -> bool {
        renewals < self.max_renewals
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_period: Duration::days(i64::from(DEFAULT_LOAN_PERIOD_DAYS)),
            max_renewals: DEFAULT_MAX_RENEWALS,
        }
    }
}
