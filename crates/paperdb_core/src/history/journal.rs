//! Partition writer and record reader.

use super::{HistoryError, HistoryResult};
use crate::model::entity::Entity;
use chrono::Utc;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File extension of history partitions.
pub const HISTORY_EXTENSION: &str = "jsonl";

const PARTITION_TIME_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Writer bound to one partition file under a history root.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    root: PathBuf,
    partition: String,
}

impl HistoryLog {
    /// Opens `root`, creating it if needed, with a partition named after the
    /// current UTC time.
    pub fn open(root: impl Into<PathBuf>) -> HistoryResult<Self> {
        let partition = format!(
            "{}.{HISTORY_EXTENSION}",
            Utc::now().format(PARTITION_TIME_FORMAT)
        );
        Self::with_partition(root, partition)
    }

    /// Opens `root` with an explicit partition file name.
    pub fn with_partition(
        root: impl Into<PathBuf>,
        partition: impl Into<String>,
    ) -> HistoryResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|err| HistoryError::io(&root, err))?;
        Ok(Self {
            root,
            partition: partition.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the partition this log appends to.
    pub fn partition_path(&self) -> PathBuf {
        self.root.join(&self.partition)
    }

    /// Appends one JSON line per entity and flushes before returning.
    pub fn append(&self, entities: &[Entity]) -> HistoryResult<()> {
        let path = self.partition_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| HistoryError::io(&path, err))?;
        let mut writer = BufWriter::new(file);
        for entity in entities {
            serde_json::to_writer(&mut writer, entity).map_err(HistoryError::Encode)?;
            writer
                .write_all(b"\n")
                .map_err(|err| HistoryError::io(&path, err))?;
        }
        writer.flush().map_err(|err| HistoryError::io(&path, err))?;
        debug!(
            "event=history_append module=history status=ok records={} partition={}",
            entities.len(),
            self.partition
        );
        Ok(())
    }
}

/// Decodes every non-blank line of a partition.
///
/// Returns `(line_number, record)` pairs with 1-based line numbers. I/O
/// failures abort the read. Lines that are not valid UTF-8 JSON come back as
/// per-line `Malformed` errors so the caller can choose to stop or skip.
pub fn read_records(path: &Path) -> HistoryResult<Vec<(usize, HistoryResult<Entity>)>> {
    let file = File::open(path).map_err(|err| HistoryError::io(path, err))?;
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line.map_err(|err| HistoryError::io(path, err))?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let line_number = index + 1;
        let record = serde_json::from_slice::<Entity>(&line).map_err(|err| {
            HistoryError::Malformed {
                path: path.to_path_buf(),
                line: line_number,
                message: err.to_string(),
            }
        });
        records.push((line_number, record));
    }
    Ok(records)
}
