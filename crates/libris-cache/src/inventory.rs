//! SQLite implementation of IInventoryStore
//!
//! The query functions take a bare connection so the same SQL runs on a
//! pooled connection or inside a lending transaction.

use sqlx::{SqliteConnection, SqlitePool};

use libris_core::domain::{ledger_now, Availability, BookId, InventoryError, StorageError, Title};
use libris_core::ports::IInventoryStore;

use crate::rows::{availability_from_row, format_datetime, title_from_row};
use crate::storage_error;

/// Pool-backed inventory store
///
/// Every call runs as its own implicit transaction.
#[derive(Clone)]
pub struct SqliteInventoryStore {
    pool: SqlitePool,
}

impl SqliteInventoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Queries
// ============================================================================

pub(crate) async fn get_title(
    conn: &mut SqliteConnection,
    book_id: &BookId,
) -> Result<Title, InventoryError> {
    let row = sqlx::query("SELECT * FROM titles WHERE id = ? AND record_status = 'live'")
        .bind(book_id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(storage_error)?
        .ok_or(InventoryError::NotFound(*book_id))?;

    Ok(title_from_row(&row).map_err(StorageError::from)?)
}

pub(crate) async fn get_availability(
    conn: &mut SqliteConnection,
    book_id: &BookId,
) -> Result<Availability, InventoryError> {
    let row = sqlx::query(
        "SELECT total, available FROM titles WHERE id = ? AND record_status = 'live'",
    )
    .bind(book_id.to_string())
    .fetch_optional(conn)
    .await
    .map_err(storage_error)?
    .ok_or(InventoryError::NotFound(*book_id))?;

    Ok(availability_from_row(&row).map_err(StorageError::from)?)
}

/// Adds `delta` to `available` in one conditional statement
///
/// The row is only touched when the result stays within `0..=total`, so a
/// rejected adjustment leaves the stored counts unchanged.
pub(crate) async fn adjust_availability(
    conn: &mut SqliteConnection,
    book_id: &BookId,
    delta: i64,
) -> Result<Availability, InventoryError> {
    let updated = sqlx::query(
        "UPDATE titles SET available = available + ?1, updated_at = ?2 \
         WHERE id = ?3 AND record_status = 'live' \
           AND available + ?1 >= 0 AND available + ?1 <= total \
         RETURNING total, available",
    )
    .bind(delta)
    .bind(format_datetime(&ledger_now()))
    .bind(book_id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage_error)?;

    if let Some(row) = updated {
        return Ok(availability_from_row(&row).map_err(StorageError::from)?);
    }

    // Nothing matched: either the title is gone or the delta is out of range.
    let current = get_availability(conn, book_id).await?;
    match current.apply(delta) {
        None => Err(InventoryError::OutOfRange {
            book_id: *book_id,
            total: current.total(),
            available: current.available(),
            delta,
        }),
        // In range now, so the counts moved between the two statements.
        Some(_) => Err(StorageError::Busy(format!("title {} changed during adjustment", book_id)).into()),
    }
}

// ============================================================================
// IInventoryStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IInventoryStore for SqliteInventoryStore {
    async fn get_title(&self, book_id: &BookId) -> Result<Title, InventoryError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        get_title(&mut conn, book_id).await
    }

    async fn get_availability(&self, book_id: &BookId) -> Result<Availability, InventoryError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        get_availability(&mut conn, book_id).await
    }

    async fn adjust_availability(
        &self,
        book_id: &BookId,
        delta: i64,
    ) -> Result<Availability, InventoryError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        let after = adjust_availability(&mut conn, book_id, delta).await?;

        tracing::debug!(
            book_id = %book_id,
            delta,
            available = after.available(),
            "Adjusted availability"
        );
        Ok(after)
    }
}
