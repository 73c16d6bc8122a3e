//! Feedsync Ingest - one-shot feed runs from the command line

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use feedsync_common::logging::{init_logging, LogConfig, LogLevel};
use feedsync_server::config::DatabaseConfig;
use feedsync_server::ingest::{
    jobs::validate_filename, DryRunStore, FeedPipeline, IngestConfig, PgTableStore, TableStore,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "feedsync-ingest")]
#[command(author, version, about = "Feedsync one-shot ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the pipeline once for a feed file
    Run {
        /// Feed filename, appended to FEED_BASE_URL
        filename: String,

        /// Read keys and schema from the store but only log statements
        #[arg(long)]
        dry_run: bool,

        /// Do not push new records to the indexing endpoint
        #[arg(long)]
        skip_index: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("feedsync-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Run {
            filename,
            dry_run,
            skip_index,
        } => run(&filename, dry_run, skip_index).await?,
    }

    info!("Ingestion complete");
    Ok(())
}

async fn run(filename: &str, dry_run: bool, skip_index: bool) -> Result<()> {
    validate_filename(filename)?;

    let mut config = IngestConfig::load_env()?;
    if skip_index {
        config.indexer.enabled = false;
    }
    config.validate()?;

    let database = DatabaseConfig::from_env();
    database.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections.min(2))
        .acquire_timeout(Duration::from_secs(database.connect_timeout_secs))
        .connect(&database.url)
        .await?;

    let mut store: Arc<dyn TableStore> = Arc::new(PgTableStore::new(
        pool,
        config.store.table.clone(),
        config.store.key_column.clone(),
    ));
    if dry_run {
        info!("Dry run: statements will be logged, not executed");
        store = Arc::new(DryRunStore::new(store));
    }

    info!("Ingesting feed {}", filename);
    let summary = FeedPipeline::new(config, store)?.run(filename).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
