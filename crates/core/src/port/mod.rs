// Port Layer - interface to the database collaborator

pub mod session;

pub use session::{ExecuteResult, Session, TransactionMode};
