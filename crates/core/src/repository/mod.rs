// Repository Components
//
// Three independent capability components (CRUD, finders, pagination)
// composed by delegation in `Repository`. Sessions are passed per call;
// the only state a component holds is the immutable entity descriptor.

pub mod base;
pub mod crud;
pub mod find;
pub mod pageable;

pub use base::Repository;
pub use crud::CrudOperations;
pub use find::{DateArg, FindOperations, LookupKey};
pub use pageable::{PageQuery, PageableOperations};

use crate::error::{RepoError, Result};
use crate::port::session::Session;

/// Every operation fails fast when the caller never supplied a usable
/// session.
pub(crate) fn ensure_session_open(session: &dyn Session) -> Result<()> {
    if session.is_open() {
        Ok(())
    } else {
        Err(RepoError::Validation("Session not initialized".into()))
    }
}
