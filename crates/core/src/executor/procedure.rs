// Stored-procedure execution over a dialect

use crate::domain::value::{Params, Record, Value};
use crate::error::{RepoError, Result};
use crate::executor::dialect::DatabaseType;
use crate::port::session::Session;
use crate::retry::{MAX_RETRIES, RETRY_DELAY};
use tracing::warn;

/// Executes stored procedures through the configured dialect.
///
/// Shares the statement executor's retry budget but, unlike it, lets the
/// underlying database error propagate unwrapped once the budget is spent.
#[derive(Debug, Default)]
pub struct ProcedureExecutor {
    db_type: DatabaseType,
}

impl ProcedureExecutor {
    pub fn new(db_type: DatabaseType) -> Self {
        Self { db_type }
    }

    /// Calls `name` and returns its row set, empty when the procedure
    /// returns none.
    pub async fn execute_procedure(
        &self,
        session: &mut dyn Session,
        name: &str,
        params: &Params,
    ) -> Result<Vec<Record>> {
        let call = self.validate_and_build(session, name, params)?;
        let result = self.run_with_retry(session, &call, params).await?;
        Ok(result.into_rows())
    }

    /// Calls `name` and returns a single value (first column, first row).
    pub async fn execute_scalar_procedure(
        &self,
        session: &mut dyn Session,
        name: &str,
        params: &Params,
    ) -> Result<Option<Value>> {
        let call = self.validate_and_build(session, name, params)?;
        let result = self.run_with_retry(session, &call, params).await?;
        Ok(result
            .into_rows()
            .first()
            .and_then(|row| row.first_value().cloned()))
    }

    fn validate_and_build(
        &self,
        session: &dyn Session,
        name: &str,
        params: &Params,
    ) -> Result<String> {
        if !session.is_open() {
            return Err(RepoError::ProcedureValidation(
                "Valid database session required".into(),
            ));
        }
        self.db_type.build_call(name, params)
    }

    async fn run_with_retry(
        &self,
        session: &mut dyn Session,
        call: &str,
        params: &Params,
    ) -> Result<crate::port::session::ExecuteResult> {
        let mut attempt = 0u32;
        loop {
            match session.execute(call, params).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt + 1 < MAX_RETRIES => {
                    attempt += 1;
                    warn!(attempt, call, error = %err, "transient procedure failure, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                // exhausted or permanent: the database error itself propagates
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSession;

    #[tokio::test]
    async fn builds_call_and_returns_rows() {
        let mut session = ScriptedSession::new();
        let mut row = Record::new();
        row.insert("id", Value::from(1));
        session.push_rows(vec![row]);

        let executor = ProcedureExecutor::new(DatabaseType::Postgres);
        let rows = executor
            .execute_procedure(
                &mut session,
                "active_users",
                &vec![("dept".to_string(), Value::from("it"))],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(session.calls[0], "execute:CALL active_users(:dept)");
    }

    #[tokio::test]
    async fn closed_session_fails_validation_before_any_call() {
        let mut session = ScriptedSession::closed();
        let executor = ProcedureExecutor::new(DatabaseType::MySql);
        let err = executor
            .execute_procedure(&mut session, "tick", &Params::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::ProcedureValidation(_)));
        assert!(session.calls.is_empty());
    }

    #[tokio::test]
    async fn exhausted_budget_propagates_database_error_unwrapped() {
        let mut session = ScriptedSession::new();
        for _ in 0..5 {
            session.push_transient("lock wait timeout");
        }

        let executor = ProcedureExecutor::new(DatabaseType::Oracle);
        let err = executor
            .execute_scalar_procedure(&mut session, "tick", &Params::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Database(_)));
        assert_eq!(session.count_calls("execute"), 5);
    }
}
