//! Engine-level error type.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::history::HistoryError;
use crate::logging::LoggingError;
use crate::model::entity::EntityKind;
use crate::model::id::EntityId;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by acquisition, import, replay and merge.
#[derive(Debug)]
pub enum StoreError {
    Config(ConfigError),
    Logging(LoggingError),
    Repo(RepoError),
    History(HistoryError),
    /// The record variant has no table and cannot be acquired on its own.
    UnsupportedEntity(&'static str),
    /// A merge set holds more than one canonical id.
    AmbiguousMergeTarget {
        kind: EntityKind,
        canonical: Vec<EntityId>,
    },
    MergeTooSmall {
        kind: EntityKind,
        distinct: usize,
    },
    NotFound {
        kind: EntityKind,
        id: EntityId,
    },
    /// A history record decoded but could not be acquired.
    Replay {
        path: PathBuf,
        line: usize,
        source: Box<StoreError>,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::History(err) => write!(f, "{err}"),
            Self::UnsupportedEntity(tag) => write!(f, "cannot acquire entity of kind `{tag}`"),
            Self::AmbiguousMergeTarget { kind, canonical } => {
                let ids = canonical
                    .iter()
                    .map(EntityId::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{kind} merge has several canonical ids: {ids}")
            }
            Self::MergeTooSmall { kind, distinct } => write!(
                f,
                "{kind} merge needs at least 2 distinct ids, got {distinct}"
            ),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Replay { path, line, source } => write!(
                f,
                "replay failed at `{}` line {line}: {source}",
                path.display()
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::History(err) => Some(err),
            Self::UnsupportedEntity(_) => None,
            Self::AmbiguousMergeTarget { .. } => None,
            Self::MergeTooSmall { .. } => None,
            Self::NotFound { .. } => None,
            Self::Replay { source, .. } => Some(&**source),
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<HistoryError> for StoreError {
    fn from(value: HistoryError) -> Self {
        Self::History(value)
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for StoreError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}
