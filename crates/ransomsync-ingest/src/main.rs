//! ransomsync - ransomware incident feed sync tool

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use ransomsync_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use ransomsync_ingest::{
    backfill::{BackfillOutcome, BackfillProcessor},
    config::SyncConfig,
    delta::{DeltaOutcome, DeltaProcessor},
    feed::FeedClient,
    snapshot::SnapshotWriter,
    storage::PgPartitionStore,
};
use std::ops::RangeInclusive;
use tracing::{error, info};

/// Years covered by a backfill when no range is given, current year included.
const DEFAULT_BACKFILL_YEARS: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "ransomsync")]
#[command(author, version, about = "Sync ransomware.live incidents into yearly PostgreSQL partitions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Truncate and reload whole years
    Backfill {
        /// First year to load (default: two years before the current one)
        #[arg(long)]
        from: Option<i32>,

        /// Last year to load (default: the current year)
        #[arg(long)]
        to: Option<i32>,
    },

    /// Append records newer than the latest stored one and export snapshots
    Delta {
        /// Partition year to update (default: the current year)
        #[arg(long)]
        year: Option<i32>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SyncConfig::load().context("Failed to load configuration")?;
    let snapshots = SnapshotWriter::new(config.snapshots.clone());
    snapshots
        .ensure_dirs()
        .context("Failed to create data directories")?;

    let log_prefix = match cli.command {
        Command::Backfill { .. } => "ransomware_backfill",
        Command::Delta { .. } => "ransomware_update",
    };
    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Both)
        .log_dir(config.snapshots.logs_dir())
        .log_file_prefix(log_prefix)
        .filter_directives("sqlx=warn,hyper=info,reqwest=info")
        .build();
    // Environment variables take precedence
    let log_config = LogConfig::from_env_or(log_config)?;
    let _guard = init_logging(&log_config)?;

    let result = run(cli.command, config, snapshots).await;
    if let Err(ref e) = result {
        error!("Sync failed: {:#}", e);
    }
    result
}

async fn run(command: Command, config: SyncConfig, snapshots: SnapshotWriter) -> Result<()> {
    let current_year = Local::now().year();
    let feed = FeedClient::new(config.feed.clone())?;
    let store = PgPartitionStore::connect(&config.database)
        .await
        .context("Failed to connect to the database")?;

    match command {
        Command::Backfill { from, to } => {
            let years = backfill_years(from, to, current_year)?;

            info!(from = *years.start(), to = *years.end(), "Starting backfill");
            let outcomes = BackfillProcessor::new(feed, store).run_range(years).await?;

            for (year, outcome) in outcomes {
                match outcome {
                    BackfillOutcome::Loaded { inserted, .. } => {
                        info!(year, inserted, "Backfill loaded")
                    },
                    BackfillOutcome::NoData => info!(year, "Backfill found no data"),
                    BackfillOutcome::NoValidRecords { .. } => {
                        info!(year, "Backfill found no valid records")
                    },
                }
            }
        },
        Command::Delta { year } => {
            let year = year.unwrap_or(current_year);

            info!(year, "Starting delta update");
            let outcome = DeltaProcessor::new(feed, store, snapshots, year).run().await?;

            match outcome {
                DeltaOutcome::UpToDate { watermark, .. } => {
                    info!(year, %watermark, "Partition already up to date")
                },
                DeltaOutcome::Appended { inserted, .. } => {
                    info!(year, inserted, "Delta update complete")
                },
            }
        },
    }

    Ok(())
}

/// Years to backfill; missing bounds default to the most recent
/// `DEFAULT_BACKFILL_YEARS` years ending at `to` or the current year.
fn backfill_years(
    from: Option<i32>,
    to: Option<i32>,
    current_year: i32,
) -> Result<RangeInclusive<i32>> {
    let to = to.unwrap_or(current_year);
    let from = match from {
        Some(from) => from,
        None => to
            .checked_sub(DEFAULT_BACKFILL_YEARS - 1)
            .with_context(|| format!("No default backfill range ends at {}", to))?,
    };

    if from > to {
        anyhow::bail!("Backfill range is empty: --from {} is after --to {}", from, to);
    }
    Ok(from..=to)
}
