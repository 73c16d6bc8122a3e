//! Feed document download

use reqwest::Client;
use tracing::{error, info};

use crate::ingest::config::FeedConfig;
use crate::ingest::error::{IngestError, Result};

/// HTTP client for feed documents
///
/// The requested filename is appended verbatim to the configured base URL.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl FeedFetcher {
    /// Create a fetcher with the configured timeout
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("feedsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}{}", self.base_url, filename)
    }

    /// Download `filename` and return the body text
    pub async fn fetch(&self, filename: &str) -> Result<String> {
        let url = self.url_for(filename);
        info!("Downloading feed from: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Feed {} could not be fetched: {}", filename, e);
            self.classify(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("Feed {} could not be accessed: HTTP {}", filename, status);
            return Err(IngestError::FeedStatus {
                filename: filename.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            error!("Feed {} body could not be read: {}", filename, e);
            self.classify(e)
        })?;

        info!("Downloaded feed {}: {} bytes ({} KB)", filename, body.len(), body.len() / 1024);
        Ok(body)
    }

    fn classify(&self, err: reqwest::Error) -> IngestError {
        if err.is_timeout() {
            IngestError::FeedTimeout(self.timeout_secs)
        } else {
            IngestError::FeedRequest(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(base_url: String, timeout_secs: u64) -> FeedFetcher {
        FeedFetcher::new(&FeedConfig {
            base_url,
            timeout_secs,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_is_base_plus_filename() {
        let f = fetcher("http://feeds.local/xml/".to_string(), 10);
        assert_eq!(f.url_for("shop.xml"), "http://feeds.local/xml/shop.xml");
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feeds/shop.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .mount(&server)
            .await;

        let f = fetcher(format!("{}/feeds/", server.uri()), 10);
        assert_eq!(f.fetch("shop.xml").await.unwrap(), "<rss/>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let f = fetcher(format!("{}/", server.uri()), 10);
        match f.fetch("missing.xml").await {
            Err(IngestError::FeedStatus { filename, status }) => {
                assert_eq!(filename, "missing.xml");
                assert_eq!(status, 404);
            },
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_slow_feed_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<rss/>")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let f = fetcher(format!("{}/", server.uri()), 1);
        assert!(matches!(f.fetch("slow.xml").await, Err(IngestError::FeedTimeout(1))));
    }
}
