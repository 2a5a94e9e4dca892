//! Partition storage
//!
//! [`PartitionStore`] is the seam between the sync processors and the
//! database. [`PgPartitionStore`] implements it on PostgreSQL with one
//! transaction per logical step.

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::stats::PartitionStats;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use ransomsync_common::{CanonicalRecord, PartitionKey};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use tracing::{debug, info};

/// Rows per INSERT statement; 7 binds each keeps well under the 65535 limit.
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 1000;

/// Canonical columns, in export order.
pub const RECORD_COLUMNS: &str =
    "sector, country, post_title, group_name, discovered_date, attack_date, month";

/// Operations the processors need from a year partition
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Remove every row and reset identity counters
    async fn truncate(&self, partition: PartitionKey) -> Result<()>;

    /// Append `records`; all or nothing
    async fn insert_many(&self, partition: PartitionKey, records: &[CanonicalRecord])
        -> Result<u64>;

    /// Latest `discovered_date`, or `None` for an empty partition
    async fn max_discovered(&self, partition: PartitionKey) -> Result<Option<NaiveDateTime>>;

    /// Aggregate counts for the partition
    async fn stats(&self, partition: PartitionKey) -> Result<PartitionStats>;

    /// Every row, newest `discovered_date` first. The identity `id` is not
    /// part of the canonical record and is left out.
    async fn current_state(&self, partition: PartitionKey) -> Result<Vec<CanonicalRecord>>;
}

/// PostgreSQL-backed partition store
#[derive(Clone)]
pub struct PgPartitionStore {
    db: PgPool,
    insert_chunk_size: usize,
}

impl PgPartitionStore {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            insert_chunk_size: DEFAULT_INSERT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(db: PgPool, insert_chunk_size: usize) -> Self {
        Self {
            db,
            insert_chunk_size: insert_chunk_size.max(1),
        }
    }

    /// Open a pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(config.connect_options()?)
            .await?;

        debug!("Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl PartitionStore for PgPartitionStore {
    async fn truncate(&self, partition: PartitionKey) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(&format!("TRUNCATE TABLE {} RESTART IDENTITY", partition.table_name()))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(table = %partition, "Truncated partition");
        Ok(())
    }

    async fn insert_many(
        &self,
        partition: PartitionKey,
        records: &[CanonicalRecord],
    ) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let table = partition.table_name();
        let total_chunks = records.len().div_ceil(self.insert_chunk_size);
        let mut inserted = 0;

        let mut tx = self.db.begin().await?;

        for (chunk_idx, chunk) in records.chunks(self.insert_chunk_size).enumerate() {
            debug!(
                "Inserting chunk {} / {} ({} rows) into {}",
                chunk_idx + 1,
                total_chunks,
                chunk.len(),
                table
            );

            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, RECORD_COLUMNS));

            query_builder.push_values(chunk, |mut b, record| {
                b.push_bind(&record.sector)
                    .push_bind(&record.country)
                    .push_bind(&record.post_title)
                    .push_bind(&record.group_name)
                    .push_bind(record.discovered_date)
                    .push_bind(record.attack_date)
                    .push_bind(record.month);
            });

            inserted += query_builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        Ok(inserted)
    }

    async fn max_discovered(&self, partition: PartitionKey) -> Result<Option<NaiveDateTime>> {
        let latest: Option<NaiveDateTime> = sqlx::query_scalar(&format!(
            "SELECT MAX(discovered_date) FROM {}",
            partition.table_name()
        ))
        .fetch_one(&self.db)
        .await?;

        Ok(latest)
    }

    async fn stats(&self, partition: PartitionKey) -> Result<PartitionStats> {
        let row = sqlx::query(&format!(
            r#"
            SELECT
                COUNT(*) AS total_incidents,
                COUNT(DISTINCT group_name) AS group_count,
                COUNT(DISTINCT NULLIF(country, '')) AS country_count
            FROM {}
            "#,
            partition.table_name()
        ))
        .fetch_one(&self.db)
        .await?;

        Ok(PartitionStats {
            total_incidents: row.try_get("total_incidents")?,
            group_count: row.try_get("group_count")?,
            country_count: row.try_get("country_count")?,
        })
    }

    async fn current_state(&self, partition: PartitionKey) -> Result<Vec<CanonicalRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} ORDER BY discovered_date DESC",
            RECORD_COLUMNS,
            partition.table_name()
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &PgRow) -> Result<CanonicalRecord> {
    Ok(CanonicalRecord {
        sector: row.try_get("sector")?,
        country: row.try_get::<Option<String>, _>("country")?.unwrap_or_default(),
        post_title: row.try_get::<Option<String>, _>("post_title")?.unwrap_or_default(),
        group_name: row.try_get("group_name")?,
        discovered_date: row.try_get("discovered_date")?,
        attack_date: row.try_get("attack_date")?,
        month: row.try_get("month")?,
    })
}
