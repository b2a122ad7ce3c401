//! SQLite implementation of ILoanLedger
//!
//! State changes go through the `Loan` state machine and are written with a
//! conditional statement: a write only applies when the row is still in the
//! state the caller observed. The partial
//! unique index `ux_loans_active_pair` rejects a second ACTIVE loan for the
//! same (user, book) pair.

use sqlx::{SqliteConnection, SqlitePool};

use libris_core::domain::{
    ledger_now, BookId, DomainError, LedgerError, Loan, LoanId, LoanPolicy, LoanRecord, Page,
    PageRequest, StorageError, UserId,
};
use libris_core::ports::{ILoanLedger, LoanFilter};

use crate::rows::{format_datetime, loan_from_row, loan_record_from_row, to_count};
use crate::{is_foreign_key_violation, is_unique_violation, storage_error};

/// Pool-backed loan ledger
#[derive(Clone)]
pub struct SqliteLoanLedger {
    pool: SqlitePool,
}

impl SqliteLoanLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_loan(row: &sqlx::sqlite::SqliteRow) -> Result<Loan, LedgerError> {
    Ok(loan_from_row(row).map_err(StorageError::from)?)
}

// ============================================================================
// Queries
// ============================================================================

pub(crate) async fn create_loan(
    conn: &mut SqliteConnection,
    user_id: &UserId,
    book_id: &BookId,
    policy: &LoanPolicy,
) -> Result<Loan, LedgerError> {
    let loan = Loan::open(*user_id, *book_id, policy, ledger_now());

    let result = sqlx::query(
        "INSERT INTO loans \
         (id, user_id, book_id, borrowed_at, due_at, returned_at, status, renewals, record_status) \
         VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?)",
    )
    .bind(loan.id().to_string())
    .bind(user_id.to_string())
    .bind(book_id.to_string())
    .bind(format_datetime(&loan.borrowed_at()))
    .bind(format_datetime(&loan.due_at()))
    .bind(loan.status().as_str())
    .bind(i64::from(loan.renewals()))
    .bind(loan.record_status().as_str())
    .execute(conn)
    .await;

    match result {
        Ok(_) => Ok(loan),
        Err(e) if is_unique_violation(&e) => Err(LedgerError::Conflict {
            user_id: *user_id,
            book_id: *book_id,
        }),
        Err(e) if is_foreign_key_violation(&e) => Err(DomainError::ValidationFailed(format!(
            "book {} does not exist",
            book_id
        ))
        .into()),
        Err(e) => Err(storage_error(e).into()),
    }
}

pub(crate) async fn close_loan(
    conn: &mut SqliteConnection,
    loan_id: &LoanId,
) -> Result<Loan, LedgerError> {
    let mut loan = get_loan(&mut *conn, loan_id).await?;
    loan.close(ledger_now())
        .map_err(|_| LedgerError::AlreadyClosed(*loan_id))?;
    let returned_at = loan.returned_at().map(|at| format_datetime(&at));

    let result = sqlx::query(
        "UPDATE loans SET status = ?, returned_at = ? \
         WHERE id = ? AND status = 'active' AND record_status = 'live'",
    )
    .bind(loan.status().as_str())
    .bind(returned_at)
    .bind(loan_id.to_string())
    .execute(conn)
    .await
    .map_err(storage_error)?;

    if result.rows_affected() == 0 {
        return Err(StorageError::Busy(format!("loan {} changed during return", loan_id)).into());
    }
    Ok(loan)
}

pub(crate) async fn extend_loan(
    conn: &mut SqliteConnection,
    loan_id: &LoanId,
    policy: &LoanPolicy,
) -> Result<Loan, LedgerError> {
    let current = get_loan(&mut *conn, loan_id).await?;
    if !current.is_active() {
        return Err(LedgerError::AlreadyClosed(*loan_id));
    }
    if !policy.can_renew(current.renewals()) {
        return Err(LedgerError::RenewalLimitExceeded {
            loan_id: *loan_id,
            limit: policy.max_renewals(),
        });
    }

    let mut renewed = current.clone();
    renewed.renew(policy)?;

    let row = sqlx::query(
        "UPDATE loans SET due_at = ?, renewals = ? \
         WHERE id = ? AND status = 'active' AND record_status = 'live' AND renewals = ? \
         RETURNING *",
    )
    .bind(format_datetime(&renewed.due_at()))
    .bind(i64::from(renewed.renewals()))
    .bind(loan_id.to_string())
    .bind(i64::from(current.renewals()))
    .fetch_optional(conn)
    .await
    .map_err(storage_error)?;

    match row {
        Some(row) => map_loan(&row),
        None => Err(StorageError::Busy(format!("loan {} changed during renewal", loan_id)).into()),
    }
}

pub(crate) async fn get_loan(
    conn: &mut SqliteConnection,
    loan_id: &LoanId,
) -> Result<Loan, LedgerError> {
    let row = sqlx::query("SELECT * FROM loans WHERE id = ? AND record_status = 'live'")
        .bind(loan_id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(storage_error)?
        .ok_or(LedgerError::NotFound(*loan_id))?;

    map_loan(&row)
}

pub(crate) async fn find_active_loan(
    conn: &mut SqliteConnection,
    user_id: &UserId,
    book_id: &BookId,
) -> Result<Option<Loan>, LedgerError> {
    let row = sqlx::query(
        "SELECT * FROM loans \
         WHERE user_id = ? AND book_id = ? AND status = 'active' AND record_status = 'live'",
    )
    .bind(user_id.to_string())
    .bind(book_id.to_string())
    .fetch_optional(conn)
    .await
    .map_err(storage_error)?;

    row.as_ref().map(map_loan).transpose()
}

/// Builds the WHERE clause for `filter` against the `l` alias of `loans`
fn filter_clause(filter: &LoanFilter) -> (String, Vec<String>) {
    let mut clause = String::from(" WHERE l.record_status = 'live'");
    let mut binds: Vec<String> = Vec::new();

    if let Some(ref user_id) = filter.user_id {
        clause.push_str(" AND l.user_id = ?");
        binds.push(user_id.to_string());
    }
    if let Some(ref book_id) = filter.book_id {
        clause.push_str(" AND l.book_id = ?");
        binds.push(book_id.to_string());
    }
    if let Some(ref status) = filter.status {
        clause.push_str(" AND l.status = ?");
        binds.push(status.as_str().to_string());
    }
    (clause, binds)
}

pub(crate) async fn list_loans(
    conn: &mut SqliteConnection,
    filter: &LoanFilter,
    page: &PageRequest,
) -> Result<Page<LoanRecord>, LedgerError> {
    let (clause, binds) = filter_clause(filter);

    let count_sql = format!("SELECT COUNT(*) AS count FROM loans l{clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total = count_query
        .fetch_one(&mut *conn)
        .await
        .map_err(storage_error)?;

    // Soft-deleted titles still name the loans that reference them.
    let items_sql = format!(
        "SELECT l.*, t.name AS book_name, t.author AS book_author, t.isbn AS book_isbn \
         FROM loans l LEFT JOIN titles t ON t.id = l.book_id{clause} \
         ORDER BY l.borrowed_at DESC, l.id DESC LIMIT ? OFFSET ?"
    );
    let mut items_query = sqlx::query(&items_sql);
    for bind in &binds {
        items_query = items_query.bind(bind);
    }
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    let rows = items_query
        .bind(i64::from(page.size()))
        .bind(offset)
        .fetch_all(conn)
        .await
        .map_err(storage_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(loan_record_from_row(row).map_err(StorageError::from)?);
    }

    Ok(Page::new(items, page, total.max(0) as u64))
}

pub(crate) async fn active_loan_count(
    conn: &mut SqliteConnection,
    book_id: &BookId,
) -> Result<u32, LedgerError> {
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

pub(crate) async fn soft_delete_loan(
    conn: &mut SqliteConnection,
    loan_id: &LoanId,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        "UPDATE loans SET record_status = 'deleted' \
         WHERE id = ? AND status = 'closed' AND record_status = 'live'",
    )
    .bind(loan_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(storage_error)?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    // Missing, already deleted, or still ACTIVE.
    let mut loan = get_loan(conn, loan_id).await?;
    loan.soft_delete()?;
    Err(StorageError::Busy(format!("loan {} changed during delete", loan_id)).into())
}

// ============================================================================
// ILoanLedger implementation
// ============================================================================

#[async_trait::async_trait]
impl ILoanLedger for SqliteLoanLedger {
    async fn create_loan(
        &self,
        user_id: &UserId,
        book_id: &BookId,
        policy: &LoanPolicy,
    ) -> Result<Loan, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        create_loan(&mut conn, user_id, book_id, policy).await
    }

    async fn close_loan(&self, loan_id: &LoanId) -> Result<Loan, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        close_loan(&mut conn, loan_id).await
    }

    async fn extend_loan(&self, loan_id: &LoanId, policy: &LoanPolicy) -> Result<Loan, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        extend_loan(&mut conn, loan_id, policy).await
    }

    async fn get_loan(&self, loan_id: &LoanId) -> Result<Loan, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        get_loan(&mut conn, loan_id).await
    }

    async fn find_active_loan(
        &self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<Option<Loan>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        find_active_loan(&mut conn, user_id, book_id).await
    }

    async fn list_loans(
        &self,
        filter: &LoanFilter,
        page: &PageRequest,
    ) -> Result<Page<LoanRecord>, LedgerError> {
        // One read transaction so the total and the items see the same snapshot.
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let listed = list_loans(&mut tx, filter, page).await?;
        tx.commit().await.map_err(storage_error)?;
        Ok(listed)
    }

    async fn active_loan_count(&self, book_id: &BookId) -> Result<u32, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        active_loan_count(&mut conn, book_id).await
    }

    async fn soft_delete_loan(&self, loan_id: &LoanId) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        soft_delete_loan(&mut conn, loan_id).await?;
        tracing::debug!(loan_id = %loan_id, "Soft-deleted loan");
        Ok(())
    }
}
