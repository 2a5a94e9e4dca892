//! Post-write partition statistics

use crate::error::Result;
use crate::storage::PartitionStore;
use ransomsync_common::PartitionKey;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Aggregate counts for one partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    /// Rows in the partition
    pub total_incidents: i64,
    /// Distinct `group_name` values
    pub group_count: i64,
    /// Distinct non-empty `country` values
    pub country_count: i64,
}

/// Query and log the statistics of `partition`
pub async fn report<S>(store: &S, partition: PartitionKey) -> Result<PartitionStats>
where
    S: PartitionStore + ?Sized,
{
    let stats = store.stats(partition).await?;

    info!(
        table = %partition,
        total_incidents = stats.total_incidents,
        group_count = stats.group_count,
        country_count = stats.country_count,
        "Statistics for {}: {} incidents, {} groups, {} countries",
        partition.year(),
        stats.total_incidents,
        stats.group_count,
        stats.country_count
    );

    Ok(stats)
}
