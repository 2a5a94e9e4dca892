//! Full historical reload of year partitions
//!
//! For each year: truncate the partition, fetch the whole year from the
//! feed, normalize, and insert what survives. The truncate happens before the
//! fetch, so a failed or empty fetch leaves that year's partition empty.

use crate::error::Result;
use crate::feed::FeedClient;
use crate::normalize::{normalize_batch, NormalizeReport};
use crate::stats::{self, PartitionStats};
use crate::storage::PartitionStore;
use ransomsync_common::PartitionKey;
use std::ops::RangeInclusive;
use tracing::{error, info, instrument, warn};

/// What a backfill did to one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// The feed returned nothing usable; the partition is empty
    NoData,
    /// Every fetched record was discarded; the partition is empty
    NoValidRecords { report: NormalizeReport },
    /// Records were loaded
    Loaded {
        inserted: u64,
        report: NormalizeReport,
        stats: PartitionStats,
    },
}

/// Reloads year partitions from the feed
pub struct BackfillProcessor<S> {
    feed: FeedClient,
    store: S,
}

impl<S: PartitionStore> BackfillProcessor<S> {
    pub fn new(feed: FeedClient, store: S) -> Self {
        Self { feed, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Backfill every year in `years`, oldest first.
    ///
    /// Stops at the first fatal error; later years are left untouched.
    pub async fn run_range(
        &self,
        years: RangeInclusive<i32>,
    ) -> Result<Vec<(i32, BackfillOutcome)>> {
        let mut outcomes = Vec::new();
        for year in years {
            let outcome = self.run(year).await?;
            outcomes.push((year, outcome));
        }
        Ok(outcomes)
    }

    /// Truncate and reload the partition for `year`
    #[instrument(skip(self))]
    pub async fn run(&self, year: i32) -> Result<BackfillOutcome> {
        let partition = PartitionKey::new(year)?;

        if let Err(e) = self.store.truncate(partition).await {
            error!(table = %partition, "Failed to truncate partition: {}", e);
            return Err(e);
        }

        let raws = match self.feed.fetch_year(year).await {
            Ok(raws) => raws,
            Err(e) => {
                error!(year, "Failed to fetch incidents: {}", e);
                Vec::new()
            },
        };

        if raws.is_empty() {
            error!(year, "No data found for year");
            return Ok(BackfillOutcome::NoData);
        }

        let (records, report) = normalize_batch(&raws, year, |_| true);
        log_discards(year, &report);

        if records.is_empty() {
            warn!(year, fetched = raws.len(), "No valid records after normalization");
            return Ok(BackfillOutcome::NoValidRecords { report });
        }

        let inserted = match self.store.insert_many(partition, &records).await {
            Ok(inserted) => inserted,
            Err(e) => {
                error!(table = %partition, "Failed to insert records: {}", e);
                return Err(e);
            },
        };
        info!(table = %partition, inserted, "Saved records");

        let stats = stats::report(&self.store, partition).await?;

        Ok(BackfillOutcome::Loaded {
            inserted,
            report,
            stats,
        })
    }
}

/// Records from other years are dropped silently per record; the totals are
/// surfaced here so feed inconsistencies stay visible.
pub(crate) fn log_discards(year: i32, report: &NormalizeReport) {
    if report.other_year > 0 {
        warn!(
            year,
            count = report.other_year,
            "Dropped records discovered in a different year"
        );
    }
    if report.missing_discovered > 0 {
        info!(
            year,
            count = report.missing_discovered,
            "Dropped records without a parseable discovered date"
        );
    }
}
