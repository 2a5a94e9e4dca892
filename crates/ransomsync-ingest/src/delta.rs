//! Incremental sync of the current year's partition
//!
//! The sync marker is the latest `discovered_date` already stored, re-read
//! on every run. Only feed records strictly newer than it are appended. Two
//! consequences follow and are accepted: a new record that shares the marker's
//! exact timestamp is never picked up, and a record whose timestamp the feed
//! later moves backwards is never re-synced.

use crate::backfill::log_discards;
use crate::error::Result;
use crate::feed::FeedClient;
use crate::normalize::{normalize_batch, NormalizeReport};
use crate::snapshot::{SnapshotKind, SnapshotWriter};
use crate::stats::{self, PartitionStats};
use crate::storage::PartitionStore;
use chrono::NaiveDateTime;
use ransomsync_common::{CanonicalRecord, PartitionKey};
use std::path::PathBuf;
use tracing::{error, info, instrument};

/// The last synced position in a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Watermark(Option<NaiveDateTime>);

impl Watermark {
    pub fn new(latest: Option<NaiveDateTime>) -> Self {
        Self(latest)
    }

    /// Read the watermark of `partition`
    pub async fn load<S>(store: &S, partition: PartitionKey) -> Result<Self>
    where
        S: PartitionStore + ?Sized,
    {
        Ok(Self(store.max_discovered(partition).await?))
    }

    pub fn latest(&self) -> Option<NaiveDateTime> {
        self.0
    }

    /// Whether `record` is past the watermark
    pub fn admits(&self, record: &CanonicalRecord) -> bool {
        match self.0 {
            Some(latest) => record.discovered_date > latest,
            None => true,
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(latest) => write!(f, "{}", latest),
            None => f.write_str("none"),
        }
    }
}

/// What a delta run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Nothing newer than the watermark; no writes, no snapshots
    UpToDate {
        watermark: Watermark,
        report: NormalizeReport,
    },
    /// New records were appended and both snapshots written
    Appended {
        watermark: Watermark,
        inserted: u64,
        report: NormalizeReport,
        stats: PartitionStats,
        new_records_path: PathBuf,
        current_state_path: PathBuf,
    },
}

/// Appends new feed records to the current year's partition
pub struct DeltaProcessor<S> {
    feed: FeedClient,
    store: S,
    snapshots: SnapshotWriter,
    year: i32,
}

impl<S: PartitionStore> DeltaProcessor<S> {
    /// `year` is the current year; only its partition is ever written.
    pub fn new(feed: FeedClient, store: S, snapshots: SnapshotWriter, year: i32) -> Self {
        Self {
            feed,
            store,
            snapshots,
            year,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self), fields(year = self.year))]
    pub async fn run(&self) -> Result<DeltaOutcome> {
        let partition = PartitionKey::new(self.year)?;

        let watermark = match Watermark::load(&self.store, partition).await {
            Ok(watermark) => watermark,
            Err(e) => {
                error!(table = %partition, "Failed to read latest discovered date: {}", e);
                return Err(e);
            },
        };
        info!(table = %partition, %watermark, "Latest discovered date in partition");

        let raws = match self.feed.fetch_year(self.year).await {
            Ok(raws) => raws,
            Err(e) => {
                error!(year = self.year, "Failed to fetch incidents: {}", e);
                Vec::new()
            },
        };

        let (records, report) =
            normalize_batch(&raws, self.year, |record| watermark.admits(record));
        log_discards(self.year, &report);

        if records.is_empty() {
            info!(table = %partition, "No new data to update");
            return Ok(DeltaOutcome::UpToDate { watermark, report });
        }

        let new_records_path =
            self.snapshots
                .write(SnapshotKind::NewRecords, self.year, &records)?;

        let inserted = match self.store.insert_many(partition, &records).await {
            Ok(inserted) => inserted,
            Err(e) => {
                error!(table = %partition, "Failed to append new records: {}", e);
                return Err(e);
            },
        };
        info!(table = %partition, inserted, "Appended new records");

        let stats = stats::report(&self.store, partition).await?;

        let state = self.store.current_state(partition).await?;
        let current_state_path =
            self.snapshots
                .write(SnapshotKind::CurrentState, self.year, &state)?;

        Ok(DeltaOutcome::Appended {
            watermark,
            inserted,
            report,
            stats,
            new_records_path,
            current_state_path,
        })
    }
}
