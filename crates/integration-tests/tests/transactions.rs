//! Transaction coordinator behavior against a live SQLite session.

use std::sync::atomic::{AtomicU32, Ordering};
use strata_core::domain::{Params, Value};
use strata_core::error::{DatabaseError, RepoError};
use strata_core::port::Session;
use strata_core::repository::Repository;
use strata_core::transaction::{with_transaction, with_transaction_options, TransactionOptions};
use strata_integration_tests::{init_logging, memory_pool, session_with_schema, User};

async fn user_count(session: &mut dyn Session) -> i64 {
    session
        .execute("SELECT COUNT(*) FROM users", &Params::new())
        .await
        .unwrap()
        .into_rows()[0]
        .first_value()
        .and_then(Value::as_integer)
        .unwrap()
}

#[tokio::test]
async fn successful_unit_of_work_commits() {
    init_logging();
    let pool = memory_pool().await;
    let mut session = session_with_schema(&pool).await;
    let repo: &'static Repository<User> = Box::leak(Box::new(Repository::new().unwrap()));

    with_transaction(&mut session, |s: &mut dyn Session| {
        Box::pin(async move {
            let mut user = User::named("committed");
            repo.save(s, &mut user).await?;
            Ok(user.id)
        })
    })
    .await
    .unwrap();

    assert_eq!(user_count(&mut session).await, 1);
}

#[tokio::test]
async fn failing_unit_of_work_rolls_back_the_insert() {
    let pool = memory_pool().await;
    let mut session = session_with_schema(&pool).await;
    let repo: &'static Repository<User> = Box::leak(Box::new(Repository::new().unwrap()));

    let err = with_transaction(&mut session, |s: &mut dyn Session| {
        Box::pin(async move {
            let mut user = User::named("phantom");
            repo.save(s, &mut user).await?;
            Err::<(), _>(RepoError::Validation("business rule violated".into()))
        })
    })
    .await
    .unwrap_err();

    match err {
        RepoError::Transaction(message) => assert!(message.contains("business rule violated")),
        other => panic!("expected wrapped Transaction error, got {other:?}"),
    }
    assert_eq!(user_count(&mut session).await, 0);
}

#[tokio::test]
async fn transient_failures_retry_and_commit_exactly_once() {
    let pool = memory_pool().await;
    let mut session = session_with_schema(&pool).await;
    let repo: &'static Repository<User> = Box::leak(Box::new(Repository::new().unwrap()));
    let attempts = AtomicU32::new(0);

    with_transaction(&mut session, |s: &mut dyn Session| {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let mut user = User::named("retried");
            repo.save(s, &mut user).await?;
            if n < 2 {
                // simulated deadlock after the write; the rollback must
                // discard this attempt's insert
                return Err(RepoError::Database(DatabaseError::transient(
                    "deadlock detected",
                )));
            }
            Ok(())
        })
    })
    .await
    .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // the side effect lands exactly once, not once per attempt
    assert_eq!(user_count(&mut session).await, 1);
}

#[tokio::test]
async fn read_only_unit_of_work_sees_data_and_never_retries() {
    let pool = memory_pool().await;
    let mut session = session_with_schema(&pool).await;
    let repo: &'static Repository<User> = Box::leak(Box::new(Repository::new().unwrap()));

    let mut user = User::named("reader");
    repo.save(&mut session, &mut user).await.unwrap();

    let names = with_transaction_options(
        &mut session,
        TransactionOptions::read_only(),
        |s: &mut dyn Session| {
                Box::pin(async move {
                let all = repo.find_all(s).await?;
                Ok(all.into_iter().filter_map(|u| u.name).collect::<Vec<_>>())
            })
        },
    )
    .await
    .unwrap();
    assert_eq!(names, vec!["reader".to_string()]);

    // a transient failure inside read_only propagates on the first attempt
    let attempts = AtomicU32::new(0);
    let err = with_transaction_options(
        &mut session,
        TransactionOptions::read_only(),
        |s: &mut dyn Session| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let _ = s;
                Err::<(), _>(RepoError::Database(DatabaseError::transient(
                    "database is locked",
                )))
            })
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RepoError::Database(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn read_only_blocks_writes_at_the_engine() {
    let pool = memory_pool().await;
    let mut session = session_with_schema(&pool).await;
    let repo: &'static Repository<User> = Box::leak(Box::new(Repository::new().unwrap()));

    let err = with_transaction_options(
        &mut session,
        TransactionOptions::read_only(),
        |s: &mut dyn Session| {
                Box::pin(async move {
                let mut user = User::named("forbidden");
                repo.save(s, &mut user).await?;
                Ok(())
            })
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RepoError::Database(_)));

    // the session is reusable afterwards: the pragma was cleared
    let mut user = User::named("allowed");
    repo.save(&mut session, &mut user).await.unwrap();
    assert_eq!(user_count(&mut session).await, 1);
}
