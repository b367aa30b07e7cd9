// Strata Infrastructure - SQLite Adapter
// Implements the Session port over sqlx

mod bind;
mod connection;
mod session;

pub use connection::create_pool;
pub use session::SqliteSession;

// Note: sqlx::Error conversion lives in session::map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for RepoError here)
