//! Store reconstruction from the history log.

use super::error::{StoreError, StoreResult};
use super::session::Session;
use crate::config::ReplayPolicy;
use crate::history::{collect_files, read_records, ReplayRange};
use log::{error, info, warn};
use std::path::Path;
use std::time::Instant;

/// Counters for one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub files: usize,
    /// Records acquired.
    pub records: usize,
    /// Malformed records skipped under `ReplayPolicy::Skip`.
    pub skipped: usize,
}

impl Session {
    /// Replays the configured history root over `range`.
    pub fn replay(&mut self, range: &ReplayRange) -> StoreResult<ReplayReport> {
        let root = self.config.history_root.clone();
        self.replay_from(&root, range)
    }

    /// Replays history files under `root` (or `root` itself when it is a file).
    ///
    /// Each record is acquired in its own transaction, so an interrupted
    /// replay keeps everything up to the failing record and can resume with a
    /// later `after` bound. Replayed records are not appended to the log again.
    pub fn replay_from(&mut self, root: &Path, range: &ReplayRange) -> StoreResult<ReplayReport> {
        let started_at = Instant::now();
        let policy = self.config.replay_policy;
        let files = collect_files(root, range)?;
        info!(
            "event=replay module=service status=start root={} files={}",
            root.display(),
            files.len()
        );

        let mut report = ReplayReport::default();
        for path in &files {
            info!(
                "event=replay_file module=service status=start path={}",
                path.display()
            );
            for (line, record) in read_records(path)? {
                let entity = match record {
                    Ok(entity) => entity,
                    Err(err) if policy == ReplayPolicy::Skip => {
                        warn!(
                            "event=replay_record module=service status=skipped path={} line={} error={}",
                            path.display(),
                            line,
                            err
                        );
                        report.skipped += 1;
                        continue;
                    }
                    Err(err) => {
                        error!(
                            "event=replay module=service status=error path={} line={} duration_ms={} error={}",
                            path.display(),
                            line,
                            started_at.elapsed().as_millis(),
                            err
                        );
                        return Err(err.into());
                    }
                };
                if let Err(err) = self.acquire_one(&entity) {
                    error!(
                        "event=replay module=service status=error path={} line={} duration_ms={} error={}",
                        path.display(),
                        line,
                        started_at.elapsed().as_millis(),
                        err
                    );
                    return Err(StoreError::Replay {
                        path: path.clone(),
                        line,
                        source: Box::new(err),
                    });
                }
                report.records += 1;
            }
            report.files += 1;
        }

        info!(
            "event=replay module=service status=ok files={} records={} skipped={} duration_ms={}",
            report.files,
            report.records,
            report.skipped,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}
