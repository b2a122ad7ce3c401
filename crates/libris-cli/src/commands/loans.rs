//! Loan listing commands
//!
//! Provides `libris history` for one user's loans and `libris loans` for
//! the administrative view over every loan.

use anyhow::Result;
use clap::{Args, Subcommand};

use libris_core::config::Config;
use libris_core::domain::{BookId, LoanId, LoanStatus, PageRequest, UserId};
use libris_core::ports::{ILoanLedger, LoanFilter};

use crate::context::Library;
use crate::output::{get_formatter, print_loan, print_loan_page, OutputFormat};

/// 1-based page selection shared by the listing commands
#[derive(Debug, Args)]
pub struct PageArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    /// Loans per page
    #[arg(long, default_value_t = 10)]
    pub size: u32,
}

impl PageArgs {
    pub fn request(&self) -> Result<PageRequest> {
        Ok(PageRequest::new(self.page, self.size)?)
    }
}

/// Show a user's loans, newest first
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// User whose loans to list
    #[arg(long)]
    pub user: UserId,
    /// Only loans that are still out
    #[arg(long)]
    pub current: bool,
    #[command(flatten)]
    pub paging: PageArgs,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let request = self.paging.request()?;
        let library = Library::open(config).await?;
        let result = self.run(&library, &request, format).await;
        library.finish(result).await
    }

    async fn run(
        &self,
        library: &Library,
        request: &PageRequest,
        format: OutputFormat,
    ) -> Result<()> {
        let page = if self.current {
            library.engine.current_loans(&self.user, request).await?
        } else {
            library.engine.history(&self.user, request).await?
        };
        print_loan_page(get_formatter(format.is_json()).as_ref(), format, &page);
        Ok(())
    }
}

#[derive(Debug, Subcommand)]
pub enum LoansCommand {
    /// List loans matching optional filters
    List {
        #[arg(long)]
        user: Option<UserId>,
        #[arg(long)]
        book: Option<BookId>,
        /// `active` or `closed`
        #[arg(long)]
        status: Option<LoanStatus>,
        #[command(flatten)]
        paging: PageArgs,
    },
    /// Show a single loan
    Show {
        loan: LoanId,
    },
    /// Hide a returned loan from every listing
    Delete {
        loan: LoanId,
    },
}

impl LoansCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let library = Library::open(config).await?;
        let result = self.run(&library, format).await;
        library.finish(result).await
    }

    async fn run(&self, library: &Library, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());

        match self {
            LoansCommand::List {
                user,
                book,
                status,
                paging,
            } => {
                let mut filter = LoanFilter::new();
                if let Some(user) = user {
                    filter = filter.with_user_id(*user);
                }
                if let Some(book) = book {
                    filter = filter.with_book_id(*book);
                }
                if let Some(status) = status {
                    filter = filter.with_status(*status);
                }
                let page = library.engine.list_loans(&filter, &paging.request()?).await?;
                print_loan_page(formatter.as_ref(), format, &page);
            }
            LoansCommand::Show { loan } => {
                let loan = library.engine.get_loan(loan).await?;
                print_loan(formatter.as_ref(), format, "Loan", &loan);
            }
            LoansCommand::Delete { loan } => {
                library.ledger.soft_delete_loan(loan).await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "loan_id": loan.to_string(),
                    }));
                } else {
                    formatter.success(&format!("Loan {} deleted", loan));
                }
            }
        }
        Ok(())
    }
}
