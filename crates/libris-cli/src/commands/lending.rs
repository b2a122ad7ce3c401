//! Lending commands - borrow, return and renew
//!
//! The acting user is always passed explicitly with `--user`.

use anyhow::Result;
use clap::Args;

use libris_core::config::Config;
use libris_core::domain::{BookId, LoanId, UserId};

use crate::context::Library;
use crate::output::{get_formatter, print_loan, OutputFormat};

/// Borrow one copy of a title
#[derive(Debug, Args)]
pub struct BorrowCommand {
    /// Borrowing user
    #[arg(long)]
    pub user: UserId,
    /// Book to borrow
    #[arg(long)]
    pub book: BookId,
}

impl BorrowCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let library = Library::open(config).await?;

        let result = library
            .engine
            .borrow(&self.user, &self.book)
            .await
            .map(|loan| print_loan(formatter.as_ref(), format, "Book borrowed", &loan))
            .map_err(Into::into);
        library.finish(result).await
    }
}

/// Return a borrowed copy
#[derive(Debug, Args)]
pub struct ReturnCommand {
    /// Loan to close
    pub loan: LoanId,
}

impl ReturnCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let library = Library::open(config).await?;

        let result = library
            .engine
            .return_loan(&self.loan)
            .await
            .map(|loan| print_loan(formatter.as_ref(), format, "Book returned", &loan))
            .map_err(Into::into);
        library.finish(result).await
    }
}

/// Extend a loan by one loan period
#[derive(Debug, Args)]
pub struct RenewCommand {
    /// Loan to renew
    pub loan: LoanId,
}

impl RenewCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let library = Library::open(config).await?;

        let result = library.engine.renew(&self.loan).await.map(|loan| {
            let headline = format!(
                "Loan renewed ({} of {} renewals used)",
                loan.renewals(),
                library.engine.policy().max_renewals()
            );
            print_loan(formatter.as_ref(), format, &headline, &loan);
        });
        library.finish(result.map_err(Into::into)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_core::domain::LoanError;

    #[tokio::test]
    async fn failed_borrow_reports_the_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("libris.db");

        let missing = BookId::new();
        let command = BorrowCommand {
            user: UserId::new(),
            book: missing,
        };
        let err = command.execute(&config, OutputFormat::Json).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<LoanError>(),
            Some(&LoanError::BookNotFound(missing))
        );

        // The database was released, so it opens again straight away.
        let library = Library::open(&config).await.unwrap();
        library.close().await;
    }
}
