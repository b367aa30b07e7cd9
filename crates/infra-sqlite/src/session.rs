// SQLite Session Implementation

use crate::bind::{bind_value, decode_row, expand_named, statement_returns_rows};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use strata_core::error::{DatabaseError, RepoError, Result};
use strata_core::port::{ExecuteResult, Session, TransactionMode};
use strata_core::domain::Params;
use tracing::debug;

// Helper to convert sqlx::Error to RepoError with transient classification.
// SQLite result codes: busy/locked resolve on retry, and so can the
// constraint class under concurrent writers (the operational/integrity
// retry class); everything else is permanent.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    let db = match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
                Some("5") | Some("6") | Some("261") | Some("262") | Some("517") => {
                    DatabaseError::transient(format!("database locked: {message}"))
                }
                // constraint violations (unique, foreign key, generic)
                Some("19") | Some("1555") | Some("2067") | Some("787") | Some("3850") => {
                    DatabaseError::transient(format!("constraint violation: {message}"))
                }
                Some(code) => {
                    DatabaseError::permanent(format!("database error [{code}]: {message}"))
                }
                None => DatabaseError::permanent(format!("database error: {message}")),
            }
        }
        sqlx::Error::PoolTimedOut => DatabaseError::transient("connection pool timed out"),
        sqlx::Error::RowNotFound => DatabaseError::permanent("row not found"),
        other => DatabaseError::permanent(other.to_string()),
    };
    RepoError::Database(db)
}

/// Session port implementation over one pooled SQLite connection.
///
/// Transaction control is explicit BEGIN/COMMIT/ROLLBACK on the same
/// connection. Read-only mode maps to `PRAGMA query_only`; repeatable
/// read needs no directive because a WAL transaction already reads from
/// one snapshot.
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
    in_tx: bool,
    read_only: bool,
    open: bool,
}

impl SqliteSession {
    /// Borrows one connection from the pool for the session's lifetime.
    pub async fn connect(pool: &SqlitePool) -> Result<Self> {
        let conn = pool.acquire().await.map_err(map_sqlx_error)?;
        Ok(Self {
            conn,
            in_tx: false,
            read_only: false,
            open: true,
        })
    }

    async fn run_simple(&mut self, sql: &str) -> Result<()> {
        sqlx::query(sql)
            .execute(&mut *self.conn)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn clear_read_only(&mut self) {
        if self.read_only {
            // best effort: the pragma must not mask the primary outcome
            let _ = self.run_simple("PRAGMA query_only = OFF").await;
            self.read_only = false;
        }
    }
}

#[async_trait]
impl Session for SqliteSession {
    async fn execute(&mut self, sql: &str, params: &Params) -> Result<ExecuteResult> {
        let (expanded, binds) = expand_named(sql, params)?;
        debug!(sql = %expanded, binds = binds.len(), "executing statement");

        if statement_returns_rows(&expanded) {
            let mut query = sqlx::query(&expanded);
            for value in &binds {
                query = bind_value(query, value);
            }
            let rows = query
                .fetch_all(&mut *self.conn)
                .await
                .map_err(map_sqlx_error)?;
            let records = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
            Ok(ExecuteResult {
                rows: Some(records),
                rows_affected: 0,
                last_insert_id: None,
            })
        } else {
            let mut query = sqlx::query(&expanded);
            for value in &binds {
                query = bind_value(query, value);
            }
            let outcome = query
                .execute(&mut *self.conn)
                .await
                .map_err(map_sqlx_error)?;
            Ok(ExecuteResult {
                rows: None,
                rows_affected: outcome.rows_affected(),
                last_insert_id: Some(outcome.last_insert_rowid()),
            })
        }
    }

    async fn begin(&mut self) -> Result<()> {
        self.run_simple("BEGIN").await?;
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let result = self.run_simple("COMMIT").await;
        if result.is_ok() {
            self.in_tx = false;
        }
        self.clear_read_only().await;
        result
    }

    async fn rollback(&mut self) -> Result<()> {
        // tolerant of an already-closed transaction: the coordinator rolls
        // back on every failure path, including a failed BEGIN
        if !self.in_tx {
            self.clear_read_only().await;
            return Ok(());
        }
        let result = self.run_simple("ROLLBACK").await;
        self.in_tx = false;
        self.clear_read_only().await;
        result
    }

    async fn set_transaction_mode(&mut self, mode: TransactionMode) -> Result<()> {
        match mode {
            TransactionMode::ReadOnly => {
                self.run_simple("PRAGMA query_only = ON").await?;
                self.read_only = true;
            }
            TransactionMode::RepeatableRead => {
                // WAL snapshot isolation already guarantees repeatable reads
                debug!("repeatable read requested; WAL snapshot applies");
            }
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_tx
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
