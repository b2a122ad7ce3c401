//! Catalog collaborator port
//!
//! The catalog owns titles and their total copy counts. The lending core
//! only needs `get_title` and the availability recomputation performed by
//! `set_total_copies`; registration and soft delete are the administrative
//! side of the same collaborator.

use crate::domain::{BookId, CatalogError, Title};

/// Port trait for catalog maintenance
#[async_trait::async_trait]
pub trait ICatalog: Send + Sync {
    /// Registers a new title; every copy starts available
    async fn add_title(&self, title: &Title) -> Result<(), CatalogError>;

    /// Retrieves a live title
    async fn get_title(&self, book_id: &BookId) -> Result<Title, CatalogError>;

    /// Changes the total copy count and recomputes `available = total - active`
    ///
    /// Fails with `CatalogError::TotalBelowActive` if more copies are on loan
    /// than the new total.
    async fn set_total_copies(&self, book_id: &BookId, total: u32) -> Result<Title, CatalogError>;

    /// Hides a title from every read path
    ///
    /// Fails with `CatalogError::ActiveLoans` while copies are out.
    async fn soft_delete_title(&self, book_id: &BookId) -> Result<(), CatalogError>;
}
