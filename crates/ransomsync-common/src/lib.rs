//! ransomsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the ransomsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Dates**: lenient timestamp parsing for feed values
//! - **Records**: raw feed records and the canonical persisted shape
//! - **Partitions**: validated year-to-table mapping
//! - **Logging**: subscriber initialization shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use ransomsync_common::date::parse_timestamp;
//! use ransomsync_common::partition::PartitionKey;
//!
//! fn main() -> ransomsync_common::Result<()> {
//!     let key = PartitionKey::new(2024)?;
//!     let ts = parse_timestamp("2024-06-15 08:30:00");
//!     println!("{} {:?}", key.table_name(), ts);
//!     Ok(())
//! }
//! ```

pub mod date;
pub mod error;
pub mod logging;
pub mod partition;
pub mod record;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use partition::PartitionKey;
pub use record::{CanonicalRecord, RawRecord};
