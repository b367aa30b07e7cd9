// Statement & Procedure Execution

pub mod dialect;
pub mod procedure;
pub mod statement;

pub use dialect::DatabaseType;
pub use procedure::ProcedureExecutor;
pub use statement::StatementExecutor;
