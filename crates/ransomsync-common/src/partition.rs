//! Year partitions
//!
//! Every incident year lives in its own table. Table names are interpolated
//! into SQL text (identifiers cannot be bound), so the only way to obtain one
//! is through a [`PartitionKey`] whose year has been range-checked.

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};

/// Table name prefix for year partitions.
pub const TABLE_PREFIX: &str = "ransomware_data_";

/// Earliest year accepted as a partition.
pub const MIN_PARTITION_YEAR: i32 = 2000;

/// Latest year accepted as a partition.
pub const MAX_PARTITION_YEAR: i32 = 2100;

/// A validated partition identifier for one incident year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    year: i32,
}

impl PartitionKey {
    /// Create a key for `year`, rejecting years outside the supported range.
    pub fn new(year: i32) -> Result<Self> {
        if !(MIN_PARTITION_YEAR..=MAX_PARTITION_YEAR).contains(&year) {
            return Err(CommonError::InvalidPartitionYear {
                year,
                min: MIN_PARTITION_YEAR,
                max: MAX_PARTITION_YEAR,
            });
        }
        Ok(Self { year })
    }

    /// The incident year this partition holds.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Table identifier, e.g. `ransomware_data_2024`.
    pub fn table_name(&self) -> String {
        format!("{}{}", TABLE_PREFIX, self.year)
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.table_name())
    }
}

impl TryFrom<i32> for PartitionKey {
    type Error = CommonError;

    fn try_from(year: i32) -> Result<Self> {
        Self::new(year)
    }
}
