//! Partition discovery and name-range filtering.

use super::{HistoryError, HistoryResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Half-open range `[after, before)` over partition file names.
///
/// Bounds compare against the file-name prefix of the bound's length, so
/// `after = "2024-03"` keeps every partition written in or after March 2024.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayRange {
    pub after: Option<String>,
    pub before: Option<String>,
}

impl ReplayRange {
    /// Unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn after(mut self, bound: impl Into<String>) -> Self {
        self.after = Some(bound.into());
        self
    }

    pub fn before(mut self, bound: impl Into<String>) -> Self {
        self.before = Some(bound.into());
        self
    }

    /// Returns whether a partition file name falls inside the range.
    pub fn contains(&self, name: &str) -> bool {
        if let Some(after) = self.after.as_deref() {
            if prefix(name, after.len()) < after.as_bytes() {
                return false;
            }
        }
        if let Some(before) = self.before.as_deref() {
            if prefix(name, before.len()) >= before.as_bytes() {
                return false;
            }
        }
        true
    }

    /// Returns whether a directory named `name` can hold partitions in the
    /// range. A name shorter than `after` is kept while it agrees with the
    /// bound on their common length.
    pub fn admits_directory(&self, name: &str) -> bool {
        if let Some(after) = self.after.as_deref() {
            let common = prefix(name, after.len());
            if common < &after.as_bytes()[..common.len()] {
                return false;
            }
        }
        if let Some(before) = self.before.as_deref() {
            if prefix(name, before.len()) >= before.as_bytes() {
                return false;
            }
        }
        true
    }
}

/// First `len` bytes of `name`, or all of it when shorter.
fn prefix(name: &str, len: usize) -> &[u8] {
    let bytes = name.as_bytes();
    &bytes[..len.min(bytes.len())]
}

/// Collects history files under `root` in replay order.
///
/// A `root` that is a file is returned as-is regardless of the range.
/// Directories are walked recursively, skipping subdirectories whose name
/// falls outside `range`; every regular file whose name is in `range` is
/// kept, ordered by path with siblings sorted by name.
pub fn collect_files(root: &Path, range: &ReplayRange) -> HistoryResult<Vec<PathBuf>> {
    let metadata = std::fs::metadata(root).map_err(|err| HistoryError::io(root, err))?;
    if metadata.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || range.admits_directory(&entry.file_name().to_string_lossy())
        });
    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            HistoryError::io(path, err.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if range.contains(&name) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
