// Central Error Type for the Data Access Layer

use thiserror::Error;

/// Transient errors are the operational/integrity class that a bounded
/// retry is expected to resolve (lock timeout, busy handle, constraint
/// race). Everything else is permanent and propagates on first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    Transient,
    Permanent,
}

/// Database-layer failure as reported by a `Session` adapter.
#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
}

impl DatabaseError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: DatabaseErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: DatabaseErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == DatabaseErrorKind::Transient
    }
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Library-level error type
#[derive(Error, Debug)]
pub enum RepoError {
    /// Caller-supplied arguments are structurally wrong (bad field name,
    /// missing session, bad sort direction, empty filter set). Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity-based lookup/update/delete found no matching row.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Transaction setup-time contract violation (invalid session/flags).
    #[error("Transaction configuration error: {0}")]
    TransactionConfig(String),

    /// Transaction entry validation failure (no usable session handle).
    #[error("Transaction validation error: {0}")]
    TransactionValidation(String),

    /// Non-database failure raised inside a unit of work, wrapped after
    /// rollback. Never retried.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Invalid procedure name, database type, or session for a procedure call.
    #[error("Procedure validation error: {0}")]
    ProcedureValidation(String),

    /// Database-layer error, classified transient or permanent by the adapter.
    #[error("Database error: {0}")]
    Database(DatabaseError),

    /// Statement execution failure after the retry budget was exhausted.
    #[error("Execution error: {0}")]
    Execution(String),
}

impl RepoError {
    /// True only for the retryable database error class.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::Database(db) if db.is_transient())
    }
}

/// Result type alias using RepoError
pub type Result<T> = std::result::Result<T, RepoError>;
