//! Inventory store port (driven/secondary port)
//!
//! Holds per-title total/available copy counts. The available counter is
//! only ever changed through [`IInventoryStore::adjust_availability`], which
//! implementations must apply as a single atomic check-and-update so two
//! concurrent decrements of the last copy cannot both succeed.

use crate::domain::{Availability, BookId, InventoryError, Title};

/// Port trait for title copy counts
#[async_trait::async_trait]
pub trait IInventoryStore: Send + Sync {
    /// Retrieves a live title
    ///
    /// Returns `InventoryError::NotFound` if the title is absent or soft-deleted.
    async fn get_title(&self, book_id: &BookId) -> Result<Title, InventoryError>;

    /// Retrieves the current copy counts of a live title
    async fn get_availability(&self, book_id: &BookId) -> Result<Availability, InventoryError>;

    /// Atomically applies `delta` to the available counter
    ///
    /// Fails with `InventoryError::OutOfRange` if the result would leave
    /// `0..=total`, leaving the counter untouched. Returns the counts after
    /// the adjustment.
    async fn adjust_availability(
        &self,
        book_id: &BookId,
        delta: i64,
    ) -> Result<Availability, InventoryError>;
}
