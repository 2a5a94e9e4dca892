//! Shared helpers for processor integration tests
//!
//! Processors run against [`MemoryPartitionStore`] and a wiremock feed, so
//! these tests need neither Docker nor network access.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ransomsync_common::{CanonicalRecord, PartitionKey};
use ransomsync_ingest::config::FeedConfig;
use ransomsync_ingest::feed::FeedClient;
use ransomsync_ingest::retry::RetryPolicy;
use ransomsync_ingest::stats::PartitionStats;
use ransomsync_ingest::storage::PartitionStore;
use ransomsync_ingest::{Result, SyncError};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ransomsync_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// In-memory partitions keyed by year
#[derive(Default)]
pub struct MemoryPartitionStore {
    partitions: Mutex<BTreeMap<i32, Vec<CanonicalRecord>>>,
    truncates: AtomicUsize,
    fail_truncate: AtomicBool,
    fail_insert: AtomicBool,
    fail_max_discovered: AtomicBool,
}

impl MemoryPartitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a partition without going through the processors
    pub fn seed(&self, year: i32, records: Vec<CanonicalRecord>) {
        self.partitions.lock().unwrap().insert(year, records);
    }

    pub fn rows(&self, year: i32) -> Vec<CanonicalRecord> {
        self.partitions
            .lock()
            .unwrap()
            .get(&year)
            .cloned()
            .unwrap_or_default()
    }

    pub fn truncate_count(&self) -> usize {
        self.truncates.load(Ordering::SeqCst)
    }

    pub fn fail_truncate(&self) {
        self.fail_truncate.store(true, Ordering::SeqCst);
    }

    pub fn fail_insert(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }

    pub fn fail_max_discovered(&self) {
        self.fail_max_discovered.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PartitionStore for MemoryPartitionStore {
    async fn truncate(&self, partition: PartitionKey) -> Result<()> {
        if self.fail_truncate.load(Ordering::SeqCst) {
            return Err(SyncError::Database(sqlx::Error::PoolTimedOut));
        }
        self.truncates.fetch_add(1, Ordering::SeqCst);
        self.partitions
            .lock()
            .unwrap()
            .insert(partition.year(), Vec::new());
        Ok(())
    }

    async fn insert_many(
        &self,
        partition: PartitionKey,
        records: &[CanonicalRecord],
    ) -> Result<u64> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(SyncError::Database(sqlx::Error::PoolTimedOut));
        }
        self.partitions
            .lock()
            .unwrap()
            .entry(partition.year())
            .or_default()
            .extend_from_slice(records);
        Ok(records.len() as u64)
    }

    async fn max_discovered(&self, partition: PartitionKey) -> Result<Option<NaiveDateTime>> {
        if self.fail_max_discovered.load(Ordering::SeqCst) {
            return Err(SyncError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self
            .rows(partition.year())
            .iter()
            .map(|r| r.discovered_date)
            .max())
    }

    async fn stats(&self, partition: PartitionKey) -> Result<PartitionStats> {
        let rows = self.rows(partition.year());
        let groups: HashSet<&str> = rows.iter().map(|r| r.group_name.as_str()).collect();
        let countries: HashSet<&str> = rows
            .iter()
            .map(|r| r.country.as_str())
            .filter(|c| !c.is_empty())
            .collect();

        Ok(PartitionStats {
            total_incidents: rows.len() as i64,
            group_count: groups.len() as i64,
            country_count: countries.len() as i64,
        })
    }

    async fn current_state(&self, partition: PartitionKey) -> Result<Vec<CanonicalRecord>> {
        let mut rows = self.rows(partition.year());
        rows.sort_by(|a, b| b.discovered_date.cmp(&a.discovered_date));
        Ok(rows)
    }
}

/// Feed client pointed at `server` with instant retries
pub fn feed_client(server: &MockServer) -> FeedClient {
    FeedClient::new(FeedConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        retry: RetryPolicy::default().with_initial_backoff(Duration::from_millis(1)),
    })
    .expect("feed client")
}

/// Serve `body` for `/victims/<year>`
pub async fn mount_year(server: &MockServer, year: i32, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/victims/{}", year)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Fail `/victims/<year>` with `status` on every attempt
pub async fn mount_failure(server: &MockServer, year: i32, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/victims/{}", year)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// A feed object
pub fn incident(group: &str, country: &str, discovered: &str) -> Value {
    serde_json::json!({
        "activity": "Manufacturing",
        "country": country,
        "post_title": format!("{} victim", group),
        "group_name": group,
        "discovered": discovered,
        "published": discovered,
    })
}

pub fn ts(value: &str) -> NaiveDateTime {
    ransomsync_common::date::parse_timestamp(value).expect("valid timestamp")
}
