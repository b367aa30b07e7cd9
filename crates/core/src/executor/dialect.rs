// Procedure call dialects
//
// Call syntax differs per engine; the placeholder convention does not:
// every parameter becomes a named bind placeholder matching its key.

use crate::domain::value::Params;
use crate::error::{RepoError, Result};

/// Supported database engines for stored-procedure calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseType {
    #[default]
    Postgres,
    MySql,
    SqlServer,
    Oracle,
}

impl DatabaseType {
    /// Builds the engine-specific call string for `name` with named
    /// placeholders taken from `params` in order. Pure; no side effects.
    pub fn build_call(&self, name: &str, params: &Params) -> Result<String> {
        if name.trim().is_empty() {
            return Err(RepoError::ProcedureValidation(
                "Valid procedure name required".into(),
            ));
        }
        let call = match self {
            DatabaseType::Postgres | DatabaseType::MySql => {
                let placeholders: Vec<String> =
                    params.iter().map(|(key, _)| format!(":{key}")).collect();
                format!("CALL {name}({})", placeholders.join(","))
            }
            DatabaseType::SqlServer => {
                let placeholders: Vec<String> = params
                    .iter()
                    .map(|(key, _)| format!("@{key}=:{key}"))
                    .collect();
                format!("EXEC {name} {}", placeholders.join(", "))
            }
            DatabaseType::Oracle => {
                let placeholders: Vec<String> =
                    params.iter().map(|(key, _)| format!(":{key}")).collect();
                format!("BEGIN {name}({}); END;", placeholders.join(","))
            }
        };
        Ok(call)
    }
}
