//! End-to-end tests for the loan engine over SQLite
//!
//! The single-process tests share one engine over an in-memory database.
//! The cross-process tests open several pools on one database file, each
//! with its own engine, so only the database serialises them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use libris_cache::{DatabasePool, SqliteCatalog, SqliteLendingStore};
use libris_core::domain::{BookId, LoanError, LoanId, LoanStatus, PageRequest, Title, UserId};
use libris_core::ports::{ICatalog, ILendingStore, ILoanLedger};
use libris_core::usecases::{LoanEngine, RetryPolicy};

// ============================================================================
// Test helpers
// ============================================================================

struct Library {
    pool: DatabasePool,
    engine: Arc<LoanEngine>,
    store: Arc<SqliteLendingStore>,
    catalog: SqliteCatalog,
}

fn library(pool: DatabasePool) -> Library {
    let store = Arc::new(SqliteLendingStore::new(pool.pool().clone()));
    let engine = LoanEngine::new(store.clone()).with_retry(RetryPolicy {
        retries: 20,
        backoff: Duration::from_millis(5),
    });
    Library {
        catalog: SqliteCatalog::new(pool.pool().clone()),
        engine: Arc::new(engine),
        store,
        pool,
    }
}

async fn setup() -> Library {
    library(
        DatabasePool::in_memory()
            .await
            .expect("Failed to create in-memory database"),
    )
}

async fn open_file(path: &Path) -> Library {
    library(DatabasePool::new(path).await.expect("Failed to open database file"))
}

async fn add_title(lib: &Library, copies: u32) -> BookId {
    let title = Title::new("Piranesi", "Susanna Clarke", None, copies).unwrap();
    lib.catalog.add_title(&title).await.unwrap();
    *title.id()
}

/// Asserts `available = total - active` for `book_id`
async fn assert_consistent(lib: &Library, book_id: &BookId) {
    let availability = lib.engine.availability(book_id).await.unwrap();
    let active = lib.store.ledger().active_loan_count(book_id).await.unwrap();
    assert_eq!(
        availability.available(),
        availability.total() - active,
        "available {} with total {} and {} active loans",
        availability.available(),
        availability.total(),
        active
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_borrow_renew_return_scenario() {
    let lib = setup().await;
    let book_id = add_title(&lib, 2).await;
    let user_id = UserId::new();

    let loan = lib.engine.borrow(&user_id, &book_id).await.unwrap();
    assert_eq!(loan.status(), LoanStatus::Active);
    assert_eq!(loan.renewals(), 0);
    assert_eq!(loan.due_at(), loan.borrowed_at() + chrono::Duration::days(30));
    assert_eq!(lib.engine.availability(&book_id).await.unwrap().available(), 1);

    let err = lib.engine.borrow(&user_id, &book_id).await.unwrap_err();
    assert_eq!(err, LoanError::AlreadyBorrowed { user_id, book_id });
    assert_eq!(lib.engine.availability(&book_id).await.unwrap().available(), 1);

    let mut due = loan.due_at();
    for expected in 1..=3 {
        let renewed = lib.engine.renew(loan.id()).await.unwrap();
        assert_eq!(renewed.renewals(), expected);
        assert_eq!(renewed.due_at(), due + chrono::Duration::days(30));
        due = renewed.due_at();
    }

    let err = lib.engine.renew(loan.id()).await.unwrap_err();
    assert_eq!(
        err,
        LoanError::RenewalLimitExceeded {
            loan_id: *loan.id(),
            limit: 3
        }
    );
    assert_eq!(lib.engine.get_loan(loan.id()).await.unwrap().due_at(), due);

    let returned = lib.engine.return_loan(loan.id()).await.unwrap();
    assert_eq!(returned.status(), LoanStatus::Closed);
    assert!(returned.returned_at().is_some());
    assert_eq!(lib.engine.availability(&book_id).await.unwrap().available(), 2);
    assert_consistent(&lib, &book_id).await;
}

#[tokio::test]
async fn test_borrow_unknown_book() {
    let lib = setup().await;
    let missing = BookId::new();
    let err = lib.engine.borrow(&UserId::new(), &missing).await.unwrap_err();
    assert_eq!(err, LoanError::BookNotFound(missing));
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_borrow_deleted_book() {
    let lib = setup().await;
    let book_id = add_title(&lib, 1).await;
    lib.catalog.soft_delete_title(&book_id).await.unwrap();

    let err = lib.engine.borrow(&UserId::new(), &book_id).await.unwrap_err();
    assert_eq!(err, LoanError::BookNotFound(book_id));
}

#[tokio::test]
async fn test_borrow_out_of_stock() {
    let lib = setup().await;
    let book_id = add_title(&lib, 1).await;
    lib.engine.borrow(&UserId::new(), &book_id).await.unwrap();

    let err = lib.engine.borrow(&UserId::new(), &book_id).await.unwrap_err();
    assert_eq!(err, LoanError::OutOfStock(book_id));
    assert!(!err.is_retryable());
    assert_consistent(&lib, &book_id).await;
}

#[tokio::test]
async fn test_title_with_no_copies_is_out_of_stock() {
    let lib = setup().await;
    let book_id = add_title(&lib, 0).await;
    let err = lib.engine.borrow(&UserId::new(), &book_id).await.unwrap_err();
    assert_eq!(err, LoanError::OutOfStock(book_id));
}

#[tokio::test]
async fn test_return_twice() {
    let lib = setup().await;
    let book_id = add_title(&lib, 1).await;
    let loan = lib.engine.borrow(&UserId::new(), &book_id).await.unwrap();

    lib.engine.return_loan(loan.id()).await.unwrap();
    let err = lib.engine.return_loan(loan.id()).await.unwrap_err();
    assert_eq!(err, LoanError::AlreadyReturned(*loan.id()));
    assert_eq!(lib.engine.availability(&book_id).await.unwrap().available(), 1);
}

#[tokio::test]
async fn test_return_and_renew_unknown_loan() {
    let lib = setup().await;
    let missing = LoanId::new();
    assert_eq!(
        lib.engine.return_loan(&missing).await.unwrap_err(),
        LoanError::LoanNotFound(missing)
    );
    assert_eq!(
        lib.engine.renew(&missing).await.unwrap_err(),
        LoanError::LoanNotFound(missing)
    );
}

#[tokio::test]
async fn test_renew_returned_loan() {
    let lib = setup().await;
    let book_id = add_title(&lib, 1).await;
    let loan = lib.engine.borrow(&UserId::new(), &book_id).await.unwrap();
    lib.engine.return_loan(loan.id()).await.unwrap();

    let err = lib.engine.renew(loan.id()).await.unwrap_err();
    assert_eq!(err, LoanError::AlreadyReturned(*loan.id()));
}

#[tokio::test]
async fn test_renewal_limit_from_policy() {
    let lib = setup().await;
    let store = Arc::new(SqliteLendingStore::new(lib.pool.pool().clone()));
    let engine = LoanEngine::new(store)
        .with_policy(libris_core::domain::LoanPolicy::new(7, 0).unwrap());
    let book_id = add_title(&lib, 1).await;

    let loan = engine.borrow(&UserId::new(), &book_id).await.unwrap();
    assert_eq!(loan.due_at(), loan.borrowed_at() + chrono::Duration::days(7));
    assert!(matches!(
        engine.renew(loan.id()).await.unwrap_err(),
        LoanError::RenewalLimitExceeded { limit: 0, .. }
    ));
}

#[tokio::test]
async fn test_borrow_again_after_return() {
    let lib = setup().await;
    let book_id = add_title(&lib, 1).await;
    let user_id = UserId::new();

    let first = lib.engine.borrow(&user_id, &book_id).await.unwrap();
    lib.engine.return_loan(first.id()).await.unwrap();
    let second = lib.engine.borrow(&user_id, &book_id).await.unwrap();

    assert_ne!(first.id(), second.id());
    assert_consistent(&lib, &book_id).await;
}

// ============================================================================
// Listings
// ============================================================================

#[tokio::test]
async fn test_history_is_newest_first_and_paged() {
    let lib = setup().await;
    let user_id = UserId::new();
    let mut borrowed = Vec::new();
    for _ in 0..3 {
        let book_id = add_title(&lib, 1).await;
        borrowed.push(lib.engine.borrow(&user_id, &book_id).await.unwrap());
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    lib.engine.return_loan(borrowed[0].id()).await.unwrap();
    // Someone else's loan never shows up.
    let other_book = add_title(&lib, 1).await;
    lib.engine.borrow(&UserId::new(), &other_book).await.unwrap();

    let first = lib
        .engine
        .history(&user_id, &PageRequest::new(1, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.total_pages(), 2);
    assert!(first.has_next());
    assert_eq!(first.items[0].loan().id(), borrowed[2].id());
    assert_eq!(first.items[0].book_name(), Some("Piranesi"));
    assert_eq!(first.items[0].book_author(), Some("Susanna Clarke"));
    assert_eq!(first.items[1].loan().id(), borrowed[1].id());

    let second = lib
        .engine
        .history(&user_id, &PageRequest::new(2, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].loan().id(), borrowed[0].id());
    assert_eq!(second.items[0].loan().status(), LoanStatus::Closed);

    let current = lib
        .engine
        .current_loans(&user_id, &PageRequest::first(10).unwrap())
        .await
        .unwrap();
    assert_eq!(current.total, 2);
    assert!(current.items.iter().all(|record| record.loan().is_active()));
}

#[tokio::test]
async fn test_history_page_past_the_end_is_empty() {
    let lib = setup().await;
    let user_id = UserId::new();
    let book_id = add_title(&lib, 1).await;
    lib.engine.borrow(&user_id, &book_id).await.unwrap();

    let page = lib
        .engine
        .history(&user_id, &PageRequest::new(5, 10).unwrap())
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_oversized_page_is_invalid() {
    let lib = setup().await;
    let err = lib
        .engine
        .history(&UserId::new(), &PageRequest::new(1, 101).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_request");
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_copy_goes_to_exactly_one_borrower() {
    let lib = setup().await;
    let book_id = add_title(&lib, 1).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&lib.engine);
        handles.push(tokio::spawn(async move {
            engine.borrow(&UserId::new(), &book_id).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(err) => assert_eq!(err, LoanError::OutOfStock(book_id)),
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(lib.engine.availability(&book_id).await.unwrap().available(), 0);
    assert_consistent(&lib, &book_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_borrowers_never_oversubscribe() {
    let lib = setup().await;
    let book_id = add_title(&lib, 3).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let engine = Arc::clone(&lib.engine);
        handles.push(tokio::spawn(async move {
            engine.borrow(&UserId::new(), &book_id).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            granted += 1;
        }
    }
    assert_eq!(granted, 3);
    assert_consistent(&lib, &book_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_user_racing_for_one_title() {
    let lib = setup().await;
    let book_id = add_title(&lib, 5).await;
    let user_id = UserId::new();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&lib.engine);
        handles.push(tokio::spawn(async move { engine.borrow(&user_id, &book_id).await }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(err) => assert_eq!(err, LoanError::AlreadyBorrowed { user_id, book_id }),
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(lib.engine.availability(&book_id).await.unwrap().available(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_return() {
    let lib = setup().await;
    let book_id = add_title(&lib, 1).await;
    let loan = lib.engine.borrow(&UserId::new(), &book_id).await.unwrap();
    let loan_id = *loan.id();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&lib.engine);
        handles.push(tokio::spawn(async move { engine.return_loan(&loan_id).await }));
    }

    let mut returned = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => returned += 1,
            Err(err) => assert_eq!(err, LoanError::AlreadyReturned(loan_id)),
        }
    }
    assert_eq!(returned, 1);
    assert_eq!(lib.engine.availability(&book_id).await.unwrap().available(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_renewals_respect_the_limit() {
    let lib = setup().await;
    let book_id = add_title(&lib, 1).await;
    let loan = lib.engine.borrow(&UserId::new(), &book_id).await.unwrap();
    let loan_id = *loan.id();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = Arc::clone(&lib.engine);
        handles.push(tokio::spawn(async move { engine.renew(&loan_id).await }));
    }

    let mut renewed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            renewed += 1;
        }
    }
    assert_eq!(renewed, 3);

    let stored = lib.engine.get_loan(&loan_id).await.unwrap();
    assert_eq!(stored.renewals(), 3);
    assert_eq!(stored.due_at(), loan.due_at() + chrono::Duration::days(90));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_return_racing_renew_on_one_loan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libris.db");
    let first = open_file(&path).await;
    let second = open_file(&path).await;
    let book_id = add_title(&first, 1).await;

    for _ in 0..10 {
        let loan = first.engine.borrow(&UserId::new(), &book_id).await.unwrap();
        let loan_id = *loan.id();

        let returning = Arc::clone(&first.engine);
        let renewing = Arc::clone(&second.engine);
        let returning_again = Arc::clone(&second.engine);
        let first_return = tokio::spawn(async move { returning.return_loan(&loan_id).await });
        let renewal = tokio::spawn(async move { renewing.renew(&loan_id).await });
        let second_return =
            tokio::spawn(async move { returning_again.return_loan(&loan_id).await });

        let mut returned = 0;
        for result in [first_return.await.unwrap(), second_return.await.unwrap()] {
            match result {
                Ok(closed) => {
                    assert_eq!(closed.status(), LoanStatus::Closed);
                    returned += 1;
                }
                Err(err) => assert_eq!(err, LoanError::AlreadyReturned(loan_id)),
            }
        }
        assert_eq!(returned, 1);

        let renewed = match renewal.await.unwrap() {
            Ok(_) => 1,
            Err(err) => {
                assert_eq!(err, LoanError::AlreadyReturned(loan_id));
                0
            }
        };

        let stored = first.engine.get_loan(&loan_id).await.unwrap();
        assert_eq!(stored.status(), LoanStatus::Closed);
        assert!(stored.returned_at().is_some());
        assert_eq!(stored.renewals(), renewed);
        assert_eq!(first.engine.availability(&book_id).await.unwrap().available(), 1);
        assert_consistent(&first, &book_id).await;
        assert_consistent(&second, &book_id).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_processes_share_one_database_safely() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libris.db");
    let first = open_file(&path).await;
    let second = open_file(&path).await;
    let book_id = add_title(&first, 2).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let engine = if i % 2 == 0 {
            Arc::clone(&first.engine)
        } else {
            Arc::clone(&second.engine)
        };
        handles.push(tokio::spawn(async move {
            engine.borrow(&UserId::new(), &book_id).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(err) => assert_eq!(err, LoanError::OutOfStock(book_id)),
        }
    }
    assert_eq!(granted, 2);
    assert_consistent(&first, &book_id).await;
    assert_consistent(&second, &book_id).await;
}

// ============================================================================
// Cancellation and durability
// ============================================================================

#[tokio::test]
async fn test_cancelled_borrows_leave_state_consistent() {
    let lib = setup().await;
    let book_id = add_title(&lib, 50).await;

    for i in 0..50u64 {
        // Some of these finish, some are dropped mid-flight.
        let _ = tokio::time::timeout(
            Duration::from_micros(i * 20),
            lib.engine.borrow(&UserId::new(), &book_id),
        )
        .await;
    }

    assert_consistent(&lib, &book_id).await;
}

#[tokio::test]
async fn test_state_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("libris.db");
    let user_id = UserId::new();

    let (book_id, kept, returned) = {
        let lib = open_file(&path).await;
        let book_id = add_title(&lib, 3).await;
        let kept = lib.engine.borrow(&user_id, &book_id).await.unwrap();
        let returned = lib.engine.borrow(&UserId::new(), &book_id).await.unwrap();
        let returned = lib.engine.return_loan(returned.id()).await.unwrap();
        lib.pool.close().await;
        (book_id, kept, returned)
    };

    let lib = open_file(&path).await;
    assert_eq!(lib.engine.get_loan(kept.id()).await.unwrap(), kept);
    assert_eq!(lib.engine.get_loan(returned.id()).await.unwrap(), returned);
    assert_eq!(lib.engine.availability(&book_id).await.unwrap().available(), 2);
    assert_consistent(&lib, &book_id).await;

    let err = lib.engine.borrow(&user_id, &book_id).await.unwrap_err();
    assert_eq!(err, LoanError::AlreadyBorrowed { user_id, book_id });
}
