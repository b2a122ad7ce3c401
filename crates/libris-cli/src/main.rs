//! Libris CLI - Command-line interface for the Libris lending engine
//!
//! Provides commands for:
//! - Borrowing, returning and renewing loans
//! - Listing a user's loan history and all loans
//! - Maintaining catalog titles and copy counts
//! - Viewing and editing configuration

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    config::ConfigCommand,
    lending::{BorrowCommand, RenewCommand, ReturnCommand},
    loans::{HistoryCommand, LoansCommand},
    title::TitleCommand,
};
use libris_core::config::{Config, LoggingConfig};
use libris_core::domain::LoanError;
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "libris", version, about = "Library lending engine")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Borrow one copy of a title
    Borrow(BorrowCommand),
    /// Return a borrowed copy
    Return(ReturnCommand),
    /// Extend a loan by one loan period
    Renew(RenewCommand),
    /// Show a user's loans, newest first
    History(HistoryCommand),
    /// List and maintain loan records
    #[command(subcommand)]
    Loans(LoansCommand),
    /// Manage catalog titles
    #[command(subcommand)]
    Title(TitleCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Installs the global tracing subscriber
///
/// `RUST_LOG` wins; otherwise `-v`/`-q` override the configured level.
fn init_tracing(logging: &LoggingConfig, verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => logging.level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    init_tracing(
        &Config::load_or_default(&config_path).logging,
        cli.verbose,
        cli.quiet,
    );

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let result = run(&cli, &config_path, format).await;

    if let Err(err) = result {
        let formatter = get_formatter(format.is_json());
        match err.downcast_ref::<LoanError>() {
            Some(loan_err) => formatter.failure(loan_err.code(), &loan_err.to_string()),
            None => formatter.error(&format!("{err:#}")),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli, config_path: &Path, format: OutputFormat) -> Result<()> {
    // Config commands must work on a file that does not validate.
    let config = || context::load_config(cli.config.as_deref());

    match &cli.command {
        Commands::Borrow(cmd) => cmd.execute(&config()?, format).await,
        Commands::Return(cmd) => cmd.execute(&config()?, format).await,
        Commands::Renew(cmd) => cmd.execute(&config()?, format).await,
        Commands::History(cmd) => cmd.execute(&config()?, format).await,
        Commands::Loans(cmd) => cmd.execute(&config()?, format).await,
        Commands::Title(cmd) => cmd.execute(&config()?, format).await,
        Commands::Config(cmd) => cmd.execute(config_path, format).await,
    }
}
