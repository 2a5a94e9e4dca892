//! CSV snapshot exports
//!
//! Delta runs leave two kinds of point-in-time files behind: the records a
//! run added, and the full partition after the run. Each kind has its own
//! directory under the data directory and keeps only the newest few files.
//! The `logs/` directory next to them is never pruned.

use crate::config::SnapshotConfig;
use crate::error::Result;
use chrono::{Local, NaiveDateTime};
use ransomsync_common::CanonicalRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name prefix shared by all snapshot files.
const FILE_PREFIX: &str = "ransomware_";

/// Timestamp embedded in snapshot names; fixed width, so it sorts lexically.
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";
const STAMP_LEN: usize = 22;

/// Timestamp layout inside CSV cells.
const CELL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// The two snapshot families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    /// Records appended by a single run
    NewRecords,
    /// The whole partition after a run
    CurrentState,
}

impl SnapshotKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            SnapshotKind::NewRecords => "new_records",
            SnapshotKind::CurrentState => "current_state",
        }
    }
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Serialize)]
struct SnapshotRow<'a> {
    sector: &'a str,
    country: &'a str,
    post_title: &'a str,
    group_name: &'a str,
    discovered_date: String,
    attack_date: String,
    month: i32,
}

impl<'a> From<&'a CanonicalRecord> for SnapshotRow<'a> {
    fn from(record: &'a CanonicalRecord) -> Self {
        Self {
            sector: &record.sector,
            country: &record.country,
            post_title: &record.post_title,
            group_name: &record.group_name,
            discovered_date: format_cell(record.discovered_date),
            attack_date: record.attack_date.map(format_cell).unwrap_or_default(),
            month: record.month,
        }
    }
}

fn format_cell(ts: NaiveDateTime) -> String {
    ts.format(CELL_FORMAT).to_string()
}

/// Writes and prunes snapshot files
pub struct SnapshotWriter {
    config: SnapshotConfig,
}

impl SnapshotWriter {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn dir(&self, kind: SnapshotKind) -> PathBuf {
        self.config.data_dir().join(kind.dir_name())
    }

    /// Create both snapshot directories and the log directory
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.dir(SnapshotKind::NewRecords),
            self.dir(SnapshotKind::CurrentState),
            self.config.logs_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Write `records` as a new `kind` snapshot for `year`, then prune `kind`.
    pub fn write(
        &self,
        kind: SnapshotKind,
        year: i32,
        records: &[CanonicalRecord],
    ) -> Result<PathBuf> {
        let dir = self.dir(kind);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(snapshot_file_name(year, Local::now().naive_local()));
        let mut writer = csv::Writer::from_path(&path)?;
        for record in records {
            writer.serialize(SnapshotRow::from(record))?;
        }
        if records.is_empty() {
            writer.write_record(CSV_HEADER)?;
        }
        writer.flush()?;

        info!(kind = %kind, path = %path.display(), rows = records.len(), "Wrote snapshot");

        self.prune(kind)?;
        Ok(path)
    }

    /// Delete the oldest `kind` snapshots beyond the retention count.
    ///
    /// Only files named like snapshots are considered; returns what was removed.
    pub fn prune(&self, kind: SnapshotKind) -> Result<Vec<PathBuf>> {
        let dir = self.dir(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(stamp) = snapshot_stamp(&path) {
                snapshots.push((stamp.to_string(), path));
            }
        }

        // Newest first
        snapshots.sort_by(|a, b| b.cmp(a));

        let mut removed = Vec::new();
        for (_, path) in snapshots.into_iter().skip(self.config.retention) {
            std::fs::remove_file(&path)?;
            info!(path = %path.display(), "Removed old snapshot");
            removed.push(path);
        }

        if removed.is_empty() {
            debug!(kind = %kind, "No snapshots to prune");
        }

        Ok(removed)
    }
}

/// Header written when a snapshot has no rows (serde only emits it with data).
const CSV_HEADER: [&str; 7] = [
    "sector",
    "country",
    "post_title",
    "group_name",
    "discovered_date",
    "attack_date",
    "month",
];

/// `ransomware_<year>_<YYYYMMDD_HHMMSS_micros>.csv`
pub fn snapshot_file_name(year: i32, at: NaiveDateTime) -> String {
    format!("{}{}_{}.csv", FILE_PREFIX, year, at.format(STAMP_FORMAT))
}

/// The embedded timestamp of a snapshot file, or `None` for other files
fn snapshot_stamp(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(".csv")?;
    let stamp = stem.get(stem.len().checked_sub(STAMP_LEN)?..)?;

    let well_formed = stamp.char_indices().all(|(i, c)| match i {
        8 | 15 => c == '_',
        _ => c.is_ascii_digit(),
    });
    well_formed.then_some(stamp)
}
