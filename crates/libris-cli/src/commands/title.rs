//! Title commands - Catalog maintenance
//!
//! Provides the `libris title` CLI commands which register titles, show
//! their copy counts, change the number of copies owned and retire them.

use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use libris_core::config::Config;
use libris_core::domain::{BookId, Title};
use libris_core::ports::ICatalog;

use crate::context::Library;
use crate::output::{get_formatter, print_title, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum TitleCommand {
    /// Register a new title; every copy starts available
    Add {
        /// Title name
        #[arg(long)]
        name: String,
        /// Author
        #[arg(long, default_value = "")]
        author: String,
        /// ISBN
        #[arg(long)]
        isbn: Option<String>,
        /// Number of copies owned
        #[arg(long, default_value_t = 1)]
        copies: u32,
    },
    /// Show a title and its availability
    Show {
        /// Book id
        book: BookId,
    },
    /// Change the number of copies owned
    SetTotal {
        /// Book id
        book: BookId,
        /// New total
        total: u32,
    },
    /// Remove a title from the catalog (only when no copies are on loan)
    Delete {
        /// Book id
        book: BookId,
    },
}

impl TitleCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let library = Library::open(config).await?;
        let result = self.run(&library, format).await;
        library.finish(result).await
    }

    async fn run(&self, library: &Library, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());

        match self {
            TitleCommand::Add {
                name,
                author,
                isbn,
                copies,
            } => {
                let title = Title::new(name.as_str(), author.as_str(), isbn.clone(), *copies)?;
                library.catalog.add_title(&title).await?;
                print_title(formatter.as_ref(), format, "Title added", &title);
            }
            TitleCommand::Show { book } => {
                let title = library.catalog.get_title(book).await?;
                print_title(formatter.as_ref(), format, "Title", &title);
            }
            TitleCommand::SetTotal { book, total } => {
                info!(book_id = %book, total, "Changing total copies");
                let title = library.catalog.set_total_copies(book, *total).await?;
                print_title(formatter.as_ref(), format, "Total copies changed", &title);
            }
            TitleCommand::Delete { book } => {
                library.catalog.soft_delete_title(book).await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "book_id": book.to_string(),
                    }));
                } else {
                    formatter.success(&format!("Title {} deleted", book));
                }
            }
        }
        Ok(())
    }
}
