//! Append-only history of submitted entities.
//!
//! # Responsibility
//! - Append imported entities as tagged JSON lines to time-named partitions.
//! - Enumerate partitions in a name range and decode their records.
//!
//! # Invariants
//! - Partition names sort lexically in submission order.
//! - Records are never rewritten; replay reads files in name order and lines
//!   in file order.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod files;
mod journal;

pub use self::files::{collect_files, ReplayRange};
pub use self::journal::{read_records, HistoryLog, HISTORY_EXTENSION};

pub type HistoryResult<T> = Result<T, HistoryError>;

/// History log error for file access and record decoding.
#[derive(Debug)]
pub enum HistoryError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A line that does not decode as any known entity variant.
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
    Encode(serde_json::Error),
}

impl Display for HistoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "history io error at `{}`: {source}", path.display())
            }
            Self::Malformed {
                path,
                line,
                message,
            } => write!(
                f,
                "malformed history record at `{}` line {line}: {message}",
                path.display()
            ),
            Self::Encode(err) => write!(f, "failed to encode history record: {err}"),
        }
    }
}

impl Error for HistoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Malformed { .. } => None,
            Self::Encode(err) => Some(err),
        }
    }
}

impl HistoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
