pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use tower_http::compression::CompressionLayer;

use crate::features::{self, FeatureState};
use crate::middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub features: FeatureState,
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let api_v1 = features::router(state.features.clone());
    let legacy = features::legacy_router(state.features.clone());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .with_state(state)
        .merge(legacy)
        .nest("/api/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "feedsync",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Result<Response, StatusCode> {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{FeedPipeline, IngestConfig, JobRegistry, PgTableStore};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        // Never connects: nothing listens on port 1.
        let db = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgresql://feedsync@127.0.0.1:1/feedsync")
            .unwrap();
        let store = Arc::new(PgTableStore::new(db.clone(), "products", "sku"));
        let pipeline = FeedPipeline::new(IngestConfig::default(), store).unwrap();

        create_router(AppState {
            db,
            features: FeatureState {
                jobs: JobRegistry::new(10),
                pipeline: Arc::new(pipeline),
            },
        })
    }

    #[tokio::test]
    async fn test_root_banner() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["name"], "feedsync");
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn test_health_reports_unavailable_store() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
