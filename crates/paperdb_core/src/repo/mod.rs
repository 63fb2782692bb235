//! Repository layer: SQL statements over the paper store.
//!
//! # Responsibility
//! - Write entity rows and edge rows keyed by packed identifiers.
//! - Persist the canonical-map.
//! - Provide parameterized bulk statements for merges.
//!
//! # Invariants
//! - Repositories never open or commit transactions; callers pass a
//!   connection that is already inside the transaction they want.
//! - Table and column names in dynamic SQL come from static schema tables,
//!   never from callers. Identifiers are always bound as parameters.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod canonical_repo;
pub mod entity_repo;
pub mod merge_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
