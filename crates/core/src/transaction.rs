// Transaction Coordinator
//
// Wraps a unit of work in a transaction boundary: validate the session,
// configure isolation, run the body, commit or roll back. The whole
// sequence retries on transient database errors unless the transaction is
// read-only; every retry re-enters from the configure step on the same
// session handle.

use crate::error::{RepoError, Result};
use crate::port::session::{Session, TransactionMode};
use crate::retry::{MAX_RETRIES, RETRY_DELAY};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

/// Boxed future returned by a unit of work.
pub type UnitOfWorkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Per-call isolation flags. `read_only` takes precedence; exactly one
/// directive is issued per transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionOptions {
    /// Issue a REPEATABLE READ directive before the body runs.
    pub auto_concurrent: bool,
    /// Mark the transaction read-only: no commit, no retry.
    pub read_only: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            auto_concurrent: true,
            read_only: false,
        }
    }
}

impl TransactionOptions {
    pub fn read_only() -> Self {
        Self {
            auto_concurrent: false,
            read_only: true,
        }
    }
}

/// Runs `body` inside a transaction with default options
/// (`auto_concurrent = true`).
pub async fn with_transaction<T, F>(session: &mut dyn Session, body: F) -> Result<T>
where
    F: for<'a> FnMut(&'a mut dyn Session) -> UnitOfWorkFuture<'a, T>,
{
    with_transaction_options(session, TransactionOptions::default(), body).await
}

/// Runs `body` inside a transaction with explicit isolation flags.
///
/// State machine per attempt:
/// `START -> CONFIGURE_ISOLATION -> RUN_BODY -> (COMMIT | ROLLBACK) -> END`.
///
/// A successful read-only transaction ends with a rollback (there is
/// nothing to commit and the snapshot must be released). Any failure rolls
/// back first; transient database errors then re-enter the boundary up to
/// the retry budget, other database errors propagate unchanged, and
/// non-database errors are wrapped in `RepoError::Transaction`.
pub async fn with_transaction_options<T, F>(
    session: &mut dyn Session,
    options: TransactionOptions,
    mut body: F,
) -> Result<T>
where
    F: for<'a> FnMut(&'a mut dyn Session) -> UnitOfWorkFuture<'a, T>,
{
    if !session.is_open() {
        return Err(RepoError::TransactionValidation(
            "Valid database session required".into(),
        ));
    }

    let mut attempt = 0u32;
    loop {
        match run_attempt(&mut *session, options, &mut body).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let _ = session.rollback().await;
                let retryable = err.is_transient() && !options.read_only;
                if retryable && attempt + 1 < MAX_RETRIES {
                    attempt += 1;
                    warn!(attempt, error = %err, "transient transaction failure, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
                return Err(wrap_failure(err));
            }
        }
    }
}

async fn run_attempt<T, F>(
    session: &mut dyn Session,
    options: TransactionOptions,
    body: &mut F,
) -> Result<T>
where
    F: for<'a> FnMut(&'a mut dyn Session) -> UnitOfWorkFuture<'a, T>,
{
    // Directives apply only when this call owns the transaction start.
    if !session.in_transaction() {
        session.begin().await?;
        if options.read_only {
            session.set_transaction_mode(TransactionMode::ReadOnly).await?;
        } else if options.auto_concurrent {
            session
                .set_transaction_mode(TransactionMode::RepeatableRead)
                .await?;
        }
        debug!(read_only = options.read_only, "transaction opened");
    }

    let value = body(&mut *session).await?;

    if options.read_only {
        session.rollback().await?;
    } else {
        session.commit().await?;
    }
    Ok(value)
}

fn wrap_failure(err: RepoError) -> RepoError {
    match err {
        RepoError::Database(_)
        | RepoError::Transaction(_)
        | RepoError::TransactionConfig(_)
        | RepoError::TransactionValidation(_) => err,
        other => RepoError::Transaction(format!("Transaction failed: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::testing::ScriptedSession;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn commits_on_success() {
        let mut session = ScriptedSession::new();
        let result = with_transaction(&mut session, |s: &mut dyn Session| {
            Box::pin(async move {
                s.execute("INSERT INTO users (name) VALUES (:p0)", &vec![])
                    .await?;
                Ok(7)
            })
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(
            session.calls,
            vec![
                "begin",
                "mode:RepeatableRead",
                "execute:INSERT INTO users (name) VALUES (:p0)",
                "commit"
            ]
        );
    }

    #[tokio::test]
    async fn read_only_configures_and_never_commits() {
        let mut session = ScriptedSession::new();
        with_transaction_options(&mut session, TransactionOptions::read_only(), |s: &mut dyn Session| {
            Box::pin(async move {
                s.execute("SELECT 1", &vec![]).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        assert_eq!(
            session.calls,
            vec!["begin", "mode:ReadOnly", "execute:SELECT 1", "rollback"]
        );
    }

    #[tokio::test]
    async fn transient_body_failure_retries_then_succeeds() {
        let mut session = ScriptedSession::new();
        let attempts = AtomicU32::new(0);

        let result = with_transaction(&mut session, |s: &mut dyn Session| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let _ = s;
                if n < 2 {
                    Err(RepoError::Database(DatabaseError::transient(
                        "deadlock detected",
                    )))
                } else {
                    Ok("done")
                }
            })
        })
        .await
        .unwrap();

        assert_eq!(result, "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // two failed attempts roll back, the third commits; each attempt
        // re-enters from the configure step
        assert_eq!(session.count_calls("begin"), 3);
        assert_eq!(session.count_calls("mode:"), 3);
        assert_eq!(session.count_calls("rollback"), 2);
        assert_eq!(session.count_calls("commit"), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_propagates_database_error() {
        let mut session = ScriptedSession::new();
        let attempts = AtomicU32::new(0);

        let err = with_transaction(&mut session, |s: &mut dyn Session| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let _ = s;
                Err::<(), _>(RepoError::Database(DatabaseError::transient(
                    "database is locked",
                )))
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RepoError::Database(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert_eq!(session.count_calls("commit"), 0);
    }

    #[tokio::test]
    async fn read_only_transient_failure_does_not_retry() {
        let mut session = ScriptedSession::new();
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
    async fn non_database_failure_rolls_back_and_wraps() {
        let mut session = ScriptedSession::new();

        let err = with_transaction(&mut session, |s: &mut dyn Session| {
            Box::pin(async move {
                let _ = s;
                Err::<(), _>(RepoError::Validation("bad input".into()))
            })
        })
        .await
        .unwrap_err();

        match err {
            RepoError::Transaction(message) => assert!(message.contains("bad input")),
            other => panic!("expected Transaction error, got {other:?}"),
        }
        assert_eq!(session.count_calls("rollback"), 1);
        assert_eq!(session.count_calls("commit"), 0);
    }

    #[tokio::test]
    async fn permanent_database_error_rolls_back_without_retry() {
        let mut session = ScriptedSession::new();
        let attempts = AtomicU32::new(0);

        let err = with_transaction(&mut session, |s: &mut dyn Session| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let _ = s;
                Err::<(), _>(RepoError::Database(DatabaseError::permanent(
                    "no such table: users",
                )))
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RepoError::Database(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(session.count_calls("rollback"), 1);
    }

    #[tokio::test]
    async fn closed_session_fails_validation_before_begin() {
        let mut session = ScriptedSession::closed();

        let err = with_transaction(&mut session, |s: &mut dyn Session| {
            Box::pin(async move {
                let _ = s;
                Ok(())
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, RepoError::TransactionValidation(_)));
        assert!(session.calls.is_empty());
    }

    #[tokio::test]
    async fn nested_call_skips_begin_and_directives() {
        let mut session = ScriptedSession::new();
        session.begin().await.unwrap();
        session.calls.clear();

        with_transaction(&mut session, |s: &mut dyn Session| {
            Box::pin(async move {
                s.execute("SELECT 1", &vec![]).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        assert_eq!(session.calls, vec!["execute:SELECT 1", "commit"]);
    }
}
