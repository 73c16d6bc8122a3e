//! Route tests for the job endpoints

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::features::{legacy_router, router, FeatureState};
    use crate::ingest::reconcile::ExistingKeys;
    use crate::ingest::statement::Schema;
    use crate::ingest::{FeedPipeline, IngestConfig, JobRegistry, Result, TableStore};

    struct EmptyStore;

    #[async_trait]
    impl TableStore for EmptyStore {
        fn table(&self) -> &str {
            "products"
        }

        async fn existing_keys(&self) -> Result<ExistingKeys> {
            Ok(ExistingKeys::default())
        }

        async fn schema(&self) -> Result<Schema> {
            Ok(Schema::new(["sku"]))
        }

        async fn execute(&self, _statement: &str) -> Result<u64> {
            Ok(0)
        }
    }

    /// Feed server answering every request after `delay`
    async fn feed_server(delay: Duration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<rss><channel/></rss>")
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        server
    }

    fn state(server: &MockServer) -> FeatureState {
        let mut config = IngestConfig::default();
        config.feed.base_url = format!("{}/", server.uri());
        let pipeline = FeedPipeline::new(config, Arc::new(EmptyStore)).unwrap();

        FeatureState {
            jobs: JobRegistry::new(10),
            pipeline: Arc::new(pipeline),
        }
    }

    fn app(state: FeatureState) -> Router {
        Router::new()
            .nest("/api/v1", router(state.clone()))
            .merge(legacy_router(state))
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_start_job_is_accepted() {
        let server = feed_server(Duration::ZERO).await;
        let app = app(state(&server));

        let response = app
            .oneshot(request(Method::POST, "/api/v1/jobs/shop.xml"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["name"], "Processing For File: shop.xml");
        assert!(body["data"]["job_id"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_filename_is_rejected() {
        let server = feed_server(Duration::ZERO).await;
        let app = app(state(&server));

        let response = app
            .oneshot(request(Method::POST, "/api/v1/jobs/..%2Fsecret"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["status"], 400);
    }

    #[tokio::test]
    async fn test_legacy_trigger_acknowledges() {
        let server = feed_server(Duration::ZERO).await;
        let state = state(&server);
        let app = app(state.clone());

        let response = app.oneshot(request(Method::GET, "/go/shop.xml")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let job_id = response.headers()["x-job-id"].to_str().unwrap().to_string();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"XML processing request received.");

        let id = uuid::Uuid::parse_str(&job_id).unwrap();
        assert!(state.jobs.get(id).await.is_some());
    }

    #[tokio::test]
    async fn test_get_job_not_found() {
        let server = feed_server(Duration::ZERO).await;
        let app = app(state(&server));

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/jobs/nonexistent-job-id"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let unknown = format!("/api/v1/jobs/{}", uuid::Uuid::new_v4());
        let response = app.oneshot(request(Method::GET, &unknown)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_and_cancel_running_job() {
        let server = feed_server(Duration::from_secs(5)).await;
        let state = state(&server);
        let app = app(state.clone());

        let job = state
            .jobs
            .spawn(state.pipeline.clone(), "slow.xml")
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/jobs?alive=true"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"][0]["state"], "running");

        let uri = format!("/api/v1/jobs/{}", job.id);
        let response = app
            .clone()
            .oneshot(request(Method::DELETE, &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["data"]["state"], "cancelled");

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app.oneshot(request(Method::GET, "/checkthreads")).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body[0][0], "Processing For File: slow.xml");
        assert_eq!(body[0][1], false);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let server = feed_server(Duration::ZERO).await;
        let app = app(state(&server));

        let uri = format!("/api/v1/jobs/{}", uuid::Uuid::new_v4());
        let response = app.oneshot(request(Method::DELETE, &uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
