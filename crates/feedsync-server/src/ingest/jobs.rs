//! Background feed runs
//!
//! Each trigger spawns one tokio task. The registry keeps the observable state
//! of every run plus an abort handle while it is in flight; finished runs are
//! kept up to a history limit, oldest evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::context::RunContext;
use super::error::{IngestError, Result};
use super::pipeline::{FeedPipeline, RunSummary};

/// Lifecycle of a feed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Snapshot of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub name: String,
    pub filename: String,
    pub state: JobState,
    pub alive: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

/// Errors returned by [`JobRegistry::cancel`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancelError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {0} has already finished")]
    AlreadyFinished(Uuid),
}

/// Display name of the job for `filename`
pub fn job_name(filename: &str) -> String {
    format!("Processing For File: {}", filename)
}

/// Reject filenames that are empty or could escape the feed base URL
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(IngestError::InvalidFilename("filename cannot be empty".to_string()));
    }
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(IngestError::InvalidFilename(format!(
            "{} must not contain path separators or '..'",
            filename
        )));
    }
    Ok(())
}

struct JobEntry {
    info: JobInfo,
    abort: Option<AbortHandle>,
}

#[derive(Default)]
struct Jobs {
    entries: HashMap<Uuid, JobEntry>,
    finished: VecDeque<Uuid>,
}

impl Jobs {
    fn retire(&mut self, id: Uuid, history_limit: usize) {
        self.finished.push_back(id);
        while self.finished.len() > history_limit {
            if let Some(oldest) = self.finished.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// Registry of spawned feed runs
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<Jobs>>,
    history_limit: usize,
}

impl JobRegistry {
    pub fn new(history_limit: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(Jobs::default())),
            history_limit,
        }
    }

    /// Start a run for `filename` in the background
    pub async fn spawn(&self, pipeline: Arc<FeedPipeline>, filename: &str) -> Result<JobInfo> {
        validate_filename(filename)?;

        let ctx = RunContext::new(filename);
        let id = ctx.run_id;
        let info = JobInfo {
            id,
            name: job_name(filename),
            filename: filename.to_string(),
            state: JobState::Running,
            alive: true,
            started_at: ctx.started_at,
            finished_at: None,
            summary: None,
            error: None,
        };

        // Registered before the task can finish, so completion always finds it.
        let mut jobs = self.jobs.write().await;
        let registry = self.clone();
        let handle = tokio::spawn(async move {
            let result = pipeline.run_with(ctx).await;
            registry.complete(id, result).await;
        });
        jobs.entries.insert(
            id,
            JobEntry {
                info: info.clone(),
                abort: Some(handle.abort_handle()),
            },
        );

        info!("Started job {} ({})", id, info.name);
        Ok(info)
    }

    async fn complete(&self, id: Uuid, result: Result<RunSummary>) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.entries.get_mut(&id) else {
            return;
        };
        if entry.info.state != JobState::Running {
            return;
        }

        match result {
            Ok(summary) => {
                entry.info.state = JobState::Completed;
                entry.info.summary = Some(summary);
            },
            Err(e) => {
                entry.info.state = JobState::Failed;
                entry.info.error = Some(e.to_string());
            },
        }
        entry.info.alive = false;
        entry.info.finished_at = Some(Utc::now());
        entry.abort = None;

        jobs.retire(id, self.history_limit);
    }

    /// All known jobs, oldest first
    pub async fn list(&self, alive_only: bool) -> Vec<JobInfo> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<JobInfo> = jobs
            .entries
            .values()
            .filter(|entry| !alive_only || entry.info.alive)
            .map(|entry| entry.info.clone())
            .collect();
        list.sort_by_key(|info| info.started_at);
        list
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        self.jobs.read().await.entries.get(&id).map(|entry| entry.info.clone())
    }

    /// Abort an in-flight run
    pub async fn cancel(&self, id: Uuid) -> std::result::Result<JobInfo, CancelError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.entries.get_mut(&id).ok_or(CancelError::NotFound(id))?;

        let Some(abort) = entry.abort.take() else {
            return Err(CancelError::AlreadyFinished(id));
        };
        abort.abort();

        entry.info.state = JobState::Cancelled;
        entry.info.alive = false;
        entry.info.finished_at = Some(Utc::now());
        let info = entry.info.clone();

        jobs.retire(id, self.history_limit);
        warn!("Cancelled job {} ({})", id, info.name);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::config::IngestConfig;
    use crate::ingest::reconcile::ExistingKeys;
    use crate::ingest::sink::TableStore;
    use crate::ingest::statement::Schema;
    use async_trait::async_trait;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticStore;

    #[async_trait]
    impl TableStore for StaticStore {
        fn table(&self) -> &str {
            "products"
        }

        async fn existing_keys(&self) -> Result<ExistingKeys> {
            Ok(ExistingKeys::new(["X"]))
        }

        async fn schema(&self) -> Result<Schema> {
            Ok(Schema::new(["sku"]))
        }

        async fn execute(&self, _statement: &str) -> Result<u64> {
            Ok(1)
        }
    }

    async fn pipeline(server: &MockServer) -> Arc<FeedPipeline> {
        let mut config = IngestConfig::default();
        config.feed.base_url = format!("{}/", server.uri());
        Arc::new(FeedPipeline::new(config, Arc::new(StaticStore)).unwrap())
    }

    async fn wait_finished(registry: &JobRegistry, id: Uuid) -> JobInfo {
        for _ in 0..100 {
            if let Some(info) = registry.get(id).await {
                if !info.alive {
                    return info;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {} did not finish", id);
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("shop.xml").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("  ").is_err());
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("a/b.xml").is_err());
        assert!(validate_filename("a\\b.xml").is_err());
    }

    #[test]
    fn test_job_name() {
        assert_eq!(job_name("shop.xml"), "Processing For File: shop.xml");
    }

    #[tokio::test]
    async fn test_spawned_job_completes_with_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<rss><channel><item><id>X</id></item><item><id>Y</id></item></channel></rss>",
            ))
            .mount(&server)
            .await;

        let registry = JobRegistry::new(10);
        let job = registry.spawn(pipeline(&server).await, "shop.xml").await.unwrap();
        assert_eq!(job.state, JobState::Running);

        let done = wait_finished(&registry, job.id).await;
        assert_eq!(done.state, JobState::Completed);
        let summary = done.summary.unwrap();
        assert_eq!(summary.new_records, 1);
        assert_eq!(summary.known_records, 1);
        assert_eq!(summary.run_id, job.id);
    }

    #[tokio::test]
    async fn test_failed_fetch_marks_job_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let registry = JobRegistry::new(10);
        let job = registry.spawn(pipeline(&server).await, "shop.xml").await.unwrap();

        let done = wait_finished(&registry, job.id).await;
        assert_eq!(done.state, JobState::Failed);
        assert!(done.error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<rss><channel/></rss>")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let registry = JobRegistry::new(10);
        let job = registry.spawn(pipeline(&server).await, "slow.xml").await.unwrap();
        assert_eq!(registry.list(true).await.len(), 1);

        let cancelled = registry.cancel(job.id).await.unwrap();
        assert_eq!(cancelled.state, JobState::Cancelled);
        assert!(registry.list(true).await.is_empty());
        assert_eq!(registry.cancel(job.id).await, Err(CancelError::AlreadyFinished(job.id)));

        let unknown = Uuid::new_v4();
        assert_eq!(registry.cancel(unknown).await, Err(CancelError::NotFound(unknown)));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel/></rss>"))
            .mount(&server)
            .await;

        let registry = JobRegistry::new(1);
        let pipeline = pipeline(&server).await;
        let first = registry.spawn(pipeline.clone(), "a.xml").await.unwrap();
        wait_finished(&registry, first.id).await;
        let second = registry.spawn(pipeline, "b.xml").await.unwrap();
        wait_finished(&registry, second.id).await;

        assert!(registry.get(first.id).await.is_none());
        assert_eq!(registry.list(false).await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_filename_is_not_spawned() {
        let server = MockServer::start().await;
        let registry = JobRegistry::new(10);
        let result = registry.spawn(pipeline(&server).await, "../x.xml").await;

        assert!(matches!(result, Err(IngestError::InvalidFilename(_))));
        assert!(registry.list(false).await.is_empty());
    }
}
