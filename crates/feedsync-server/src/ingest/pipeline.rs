//! Feed run orchestration
//!
//! One run: fetch the feed, read the existing identifiers, parse, reconcile,
//! push NEW records to the indexing endpoint, then batch, build and execute
//! insert statements in order. Every stage hands an owned value to the next.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::batcher::partition;
use super::config::IngestConfig;
use super::context::RunContext;
use super::error::{IngestError, Result};
use super::feed::{FeedFetcher, FeedParser};
use super::reconcile::reconcile;
use super::sink::{IndexStats, IndexingClient, TableStore};
use super::statement::StatementBuilder;

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub filename: String,
    pub items_parsed: usize,
    pub defective: usize,
    pub new_records: usize,
    pub known_records: usize,
    pub batches: usize,
    pub statements: usize,
    pub rows_inserted: u64,
    pub index_pushed: usize,
    pub index_failed: usize,
    pub duration_secs: f64,
}

impl RunSummary {
    fn start(ctx: &RunContext) -> Self {
        Self {
            run_id: ctx.run_id,
            filename: ctx.filename.clone(),
            ..Default::default()
        }
    }

    fn finish(mut self, ctx: &RunContext) -> Self {
        self.duration_secs = ctx.elapsed_secs();
        info!(
            "Run finished: {} parsed, {} new, {} known, {} defective, {} batches, {} statements, \
             {} rows inserted, {} indexed ({} failed) in {:.2}s",
            self.items_parsed,
            self.new_records,
            self.known_records,
            self.defective,
            self.batches,
            self.statements,
            self.rows_inserted,
            self.index_pushed,
            self.index_failed,
            self.duration_secs
        );
        self
    }
}

/// The feed-to-store pipeline, shared by every run
pub struct FeedPipeline {
    config: IngestConfig,
    store: Arc<dyn TableStore>,
    fetcher: FeedFetcher,
    parser: FeedParser,
    builder: StatementBuilder,
    indexer: Option<IndexingClient>,
}

impl FeedPipeline {
    pub fn new(config: IngestConfig, store: Arc<dyn TableStore>) -> Result<Self> {
        let fetcher = FeedFetcher::new(&config.feed)?;
        let parser = FeedParser::new(config.feed.namespace.clone());
        let builder = StatementBuilder::new(store.table(), config.missing_value);
        let indexer = if config.indexer.enabled {
            Some(IndexingClient::new(&config.indexer)?)
        } else {
            None
        };

        Ok(Self {
            config,
            store,
            fetcher,
            parser,
            builder,
            indexer,
        })
    }

    /// Disable the indexing push for this pipeline
    pub fn without_indexing(mut self) -> Self {
        self.indexer = None;
        self
    }

    /// Run the pipeline for `filename` with a fresh context
    pub async fn run(&self, filename: &str) -> Result<RunSummary> {
        self.run_with(RunContext::new(filename)).await
    }

    /// Run the pipeline under an existing context
    pub async fn run_with(&self, ctx: RunContext) -> Result<RunSummary> {
        let span = info_span!("feed_run", run_id = %ctx.run_id, filename = %ctx.filename);
        async move {
            let result = self.execute(&ctx).await;
            if let Err(e) = &result {
                error!("Run failed: {}", e);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, ctx: &RunContext) -> Result<RunSummary> {
        info!("Processing feed: {}", ctx.filename);
        let mut summary = RunSummary::start(ctx);

        let document = self.fetcher.fetch(&ctx.filename).await?;

        let existing = self.store.existing_keys().await?;
        if existing.is_empty() {
            error!("No existing identifiers returned from {}", self.store.table());
            if self.config.abort_on_empty_existing {
                return Err(IngestError::EmptyExistingKeys);
            }
        }

        let items = self.parser.parse(&document)?;
        drop(document);
        summary.items_parsed = items.len();

        let reconciliation = reconcile(items, &existing, &self.config.record_version, ctx);
        summary.defective = reconciliation.defective.len();
        summary.new_records = reconciliation.new.len();
        summary.known_records = reconciliation.known.len();

        if reconciliation.is_empty() {
            info!("No new products found, nothing to load");
            return Ok(summary.finish(ctx));
        }

        if let Some(indexer) = &self.indexer {
            let IndexStats { pushed, failed } = indexer.push_all(&reconciliation.new).await;
            summary.index_pushed = pushed;
            summary.index_failed = failed;
        }

        let batches = partition(reconciliation.new, self.config.max_batch_records);
        summary.batches = batches.len();

        let schema = self.store.schema().await?;
        for (index, batch) in batches.iter().enumerate() {
            let statements =
                self.builder
                    .build_bounded(&schema, batch, self.config.max_statement_bytes)?;

            for statement in &statements {
                summary.rows_inserted += self.store.execute(statement).await?;
            }
            summary.statements += statements.len();

            info!(
                "Loaded batch {}/{}: {} records in {} statement(s)",
                index + 1,
                batches.len(),
                batch.len(),
                statements.len()
            );
        }

        Ok(summary.finish(ctx))
    }
}
