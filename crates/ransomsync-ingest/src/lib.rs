//! ransomsync Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Keeps per-year PostgreSQL partitions in sync with the ransomware.live
//! victims feed.
//!
//! # Modes
//!
//! - **Backfill**: truncate and reload whole years ([`backfill::BackfillProcessor`])
//! - **Delta**: append records newer than the stored watermark to the current
//!   year and export CSV snapshots ([`delta::DeltaProcessor`])
//!
//! # Example
//!
//! ```no_run
//! use ransomsync_ingest::{
//!     config::SyncConfig, delta::DeltaProcessor, feed::FeedClient,
//!     snapshot::SnapshotWriter, storage::PgPartitionStore,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig::load()?;
//!     let store = PgPartitionStore::connect(&config.database).await?;
//!     let feed = FeedClient::new(config.feed.clone())?;
//!     let snapshots = SnapshotWriter::new(config.snapshots.clone());
//!
//!     let outcome = DeltaProcessor::new(feed, store, snapshots, 2025).run().await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod backfill;
pub mod config;
pub mod delta;
pub mod error;
pub mod feed;
pub mod normalize;
pub mod retry;
pub mod snapshot;
pub mod stats;
pub mod storage;

pub use error::{Result, SyncError};
