//! SQLite implementation of ICatalog
//!
//! Total-copy changes recompute `available = total - active` under the
//! database write lock, so no borrow or return can interleave between the
//! count and the update.

use sqlx::{SqliteConnection, SqlitePool};

use libris_core::domain::{ledger_now, BookId, CatalogError, DomainError, StorageError, Title};
use libris_core::ports::ICatalog;

use crate::lending::reserve_writer;
use crate::rows::{format_datetime, title_from_row, to_count};
use crate::{is_unique_violation, storage_error};

/// Pool-backed catalog
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn fetch_title(conn: &mut SqliteConnection, book_id: &BookId) -> Result<Title, CatalogError> {
    let row = sqlx::query("SELECT * FROM titles WHERE id = ? AND record_status = 'live'")
        .bind(book_id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(storage_error)?
        .ok_or(CatalogError::NotFound(*book_id))?;

    Ok(title_from_row(&row).map_err(StorageError::from)?)
}

async fn count_active_loans(
    conn: &mut SqliteConnection,
    book_id: &BookId,
) -> Result<u32, CatalogError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM loans \
         WHERE book_id = ? AND status = 'active' AND record_status = 'live'",
    )
    .bind(book_id.to_string())
    .fetch_one(conn)
    .await
    .map_err(storage_error)?;

    Ok(to_count("active loans", count).map_err(StorageError::from)?)
}

#[async_trait::async_trait]
impl ICatalog for SqliteCatalog {
    async fn add_title(&self, title: &Title) -> Result<(), CatalogError> {
        if !title.record_status().is_live() {
            return Err(DomainError::ValidationFailed(
                "cannot register a deleted title".to_string(),
            )
            .into());
        }

        let result = sqlx::query(
            "INSERT INTO titles \
             (id, name, author, isbn, total, available, record_status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(title.id().to_string())
        .bind(title.name())
        .bind(title.author())
        .bind(title.isbn())
        .bind(i64::from(title.total_copies()))
        .bind(i64::from(title.available_copies()))
        .bind(title.record_status().as_str())
        .bind(format_datetime(&title.created_at()))
        .bind(format_datetime(&title.updated_at()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    book_id = %title.id(),
                    name = %title.name(),
                    total = title.total_copies(),
                    "Title added"
                );
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(DomainError::ValidationFailed(format!(
                "title {} already exists",
                title.id()
            ))
            .into()),
            Err(e) => Err(storage_error(e).into()),
        }
    }

    async fn get_title(&self, book_id: &BookId) -> Result<Title, CatalogError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        fetch_title(&mut conn, book_id).await
    }

    async fn set_total_copies(&self, book_id: &BookId, total: u32) -> Result<Title, CatalogError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        reserve_writer(&mut tx).await?;

        fetch_title(&mut tx, book_id).await?;
        let active = count_active_loans(&mut tx, book_id).await?;
        if total < active {
            return Err(CatalogError::TotalBelowActive {
                book_id: *book_id,
                total,
                active,
            });
        }

        let row = sqlx::query(
            "UPDATE titles SET total = ?, available = ?, updated_at = ? \
             WHERE id = ? AND record_status = 'live' \
             RETURNING *",
        )
        .bind(i64::from(total))
        .bind(i64::from(total - active))
        .bind(format_datetime(&ledger_now()))
        .bind(book_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;
        let title = title_from_row(&row).map_err(StorageError::from)?;

        tx.commit().await.map_err(storage_error)?;

        tracing::info!(
            book_id = %book_id,
            total,
            available = title.available_copies(),
            "Total copies changed"
        );
        Ok(title)
    }

    async fn soft_delete_title(&self, book_id: &BookId) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        reserve_writer(&mut tx).await?;

        fetch_title(&mut tx, book_id).await?;
        let active = count_active_loans(&mut tx, book_id).await?;
        if active > 0 {
            return Err(CatalogError::ActiveLoans {
                book_id: *book_id,
                active,
            });
        }

        sqlx::query("UPDATE titles SET record_status = 'deleted', updated_at = ? WHERE id = ?")
            .bind(format_datetime(&ledger_now()))
            .bind(book_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;

        tracing::info!(book_id = %book_id, "Title deleted");
        Ok(())
    }
}
