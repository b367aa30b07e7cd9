// Raw statement execution with bounded retry on transient errors

use crate::domain::value::{Params, Record, Value};
use crate::error::{RepoError, Result};
use crate::port::session::Session;
use crate::retry::{MAX_RETRIES, RETRY_DELAY};
use tracing::warn;

/// Executes raw SQL text against a caller-supplied session.
///
/// Transient database errors are retried up to the fixed budget with a
/// fixed delay; the exhausted error is wrapped in a descriptive
/// `Execution` failure. Permanent errors propagate on the first attempt.
/// Never commits; transaction boundaries belong to the coordinator.
#[derive(Debug, Default)]
pub struct StatementExecutor;

impl StatementExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `sql` and returns its row set, or an empty vec for statements
    /// that return none.
    pub async fn execute_rows(
        &self,
        session: &mut dyn Session,
        sql: &str,
        params: &Params,
    ) -> Result<Vec<Record>> {
        let result = self.run_with_retry(session, sql, params).await?;
        Ok(result.into_rows())
    }

    /// Runs `sql` and returns the first column of the first row, if any.
    pub async fn execute_scalar(
        &self,
        session: &mut dyn Session,
        sql: &str,
        params: &Params,
    ) -> Result<Option<Value>> {
        let result = self.run_with_retry(session, sql, params).await?;
        Ok(result
            .into_rows()
            .first()
            .and_then(|row| row.first_value().cloned()))
    }

    async fn run_with_retry(
        &self,
        session: &mut dyn Session,
        sql: &str,
        params: &Params,
    ) -> Result<crate::port::session::ExecuteResult> {
        let mut attempt = 0u32;
        loop {
            match session.execute(sql, params).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() => {
                    if attempt + 1 < MAX_RETRIES {
                        attempt += 1;
                        warn!(attempt, error = %err, "transient statement failure, retrying");
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    return Err(RepoError::Execution(format!(
                        "error executing statement after {MAX_RETRIES} attempts: {err}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }
}
