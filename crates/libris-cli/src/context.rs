//! Shared setup for commands: configuration and the opened library

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use libris_cache::{DatabasePool, SqliteCatalog, SqliteLendingStore, SqliteLoanLedger};
use libris_core::config::Config;
use libris_core::usecases::LoanEngine;

/// Loads the configuration from `path`, or from the default location
///
/// An explicitly given file must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration: {}", messages.join("; "));
    }
    Ok(config)
}

/// The opened database together with the services built on it
pub struct Library {
    pub pool: DatabasePool,
    pub engine: LoanEngine,
    pub catalog: SqliteCatalog,
    /// Direct ledger access for record maintenance
    pub ledger: SqliteLoanLedger,
}

impl Library {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = DatabasePool::with_config(&config.database)
            .await
            .context("Failed to open database")?;

        let store = Arc::new(SqliteLendingStore::new(pool.pool().clone()));
        let engine = LoanEngine::from_config(store, &config.lending)
            .context("Invalid lending configuration")?;
        let catalog = SqliteCatalog::new(pool.pool().clone());
        let ledger = SqliteLoanLedger::new(pool.pool().clone());

        tracing::debug!(path = %config.database.path.display(), "Library opened");
        Ok(Self {
            pool,
            engine,
            catalog,
            ledger,
        })
    }

    /// Flushes and closes the database
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Closes the database, then hands back a command's outcome unchanged
    pub async fn finish<T>(self, result: Result<T>) -> Result<T> {
        self.close().await;
        result
    }
}
