//! Feature modules implementing the trigger API
//!
//! - **jobs**: start, inspect and cancel feed runs
//!
//! Versioned routes are mounted under `/api/v1` by [`router`]; the bare
//! `/go/:file_name` and `/checkthreads` endpoints kept for existing callers
//! come from [`legacy_router`].

pub mod jobs;

use std::sync::Arc;

use axum::Router;

use crate::ingest::{FeedPipeline, JobRegistry};

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Every run spawned by this process
    pub jobs: JobRegistry,
    /// Pipeline each new run executes
    pub pipeline: Arc<FeedPipeline>,
}

/// Versioned API routes
pub fn router(state: FeatureState) -> Router {
    Router::new().merge(jobs::jobs_routes()).with_state(state)
}

/// Unversioned trigger routes
pub fn legacy_router(state: FeatureState) -> Router {
    Router::new().merge(jobs::legacy_routes()).with_state(state)
}
