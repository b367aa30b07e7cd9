// Session port - the narrow interface every component calls through
//
// A session is an opaque handle to one live connection plus its
// transaction state, supplied by the caller and never owned here. One
// logical unit of work uses a session at a time; retries reuse the same
// handle and re-enter the transaction boundary from scratch.

use crate::domain::value::{Params, Record};
use crate::error::Result;
use async_trait::async_trait;

/// Isolation directive issued once per transaction, before any statement.
/// Adapters render the engine-specific form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// "SET TRANSACTION READ ONLY" equivalent.
    ReadOnly,
    /// "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ" equivalent.
    RepeatableRead,
}

/// Outcome of one statement execution.
#[derive(Debug, Clone, Default)]
pub struct ExecuteResult {
    /// `Some` iff the statement returned a row set (possibly empty).
    pub rows: Option<Vec<Record>>,
    pub rows_affected: u64,
    /// Identity generated by the statement, when the engine reports one.
    pub last_insert_id: Option<i64>,
}

impl ExecuteResult {
    pub fn returns_rows(&self) -> bool {
        self.rows.is_some()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows.unwrap_or_default()
    }
}

/// Live database session. Adapters classify every failure as a transient
/// or permanent `RepoError::Database`; no other error kind may cross this
/// boundary.
#[async_trait]
pub trait Session: Send {
    /// Executes one statement with named bind parameters (`:{name}`).
    async fn execute(&mut self, sql: &str, params: &Params) -> Result<ExecuteResult>;

    /// Opens a transaction. Statements outside an open transaction
    /// auto-commit.
    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Issues the isolation directive for the current transaction.
    async fn set_transaction_mode(&mut self, mode: TransactionMode) -> Result<()>;

    fn in_transaction(&self) -> bool;

    /// False once the underlying connection has been released.
    fn is_open(&self) -> bool;
}
