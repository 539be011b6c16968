//! Document retrieval over HTTP
//!
//! [`DocumentFetcher`] is the seam between the catalog pipeline and the
//! network. [`HttpFetcher`] is the production implementation; tests swap in
//! fakes that serve documents from memory.

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::download_with_retry;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Retrieves remote documents
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch a document body
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Fetch a document and store it at `dest`, returning the stored path
    async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let body = self.fetch_bytes(url).await?;
        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| Error::file(dest, e))?;
        tracing::trace!(url, path = %dest.display(), bytes = body.len(), "Stored document");
        Ok(dest.to_path_buf())
    }
}

/// Basic-auth HTTP client with per-request timeout and retry
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Build a fetcher from the download, auth and retry settings
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.download.request_timeout)
            .user_agent(config.download.user_agent.as_str())
            .build()
            .map_err(|e| Error::config("user_agent", format!("failed to create HTTP client: {}", e)))?;

        let (username, password) = match &config.auth {
            Some(auth) => (Some(auth.username.clone()), auth.password.clone()),
            None => (None, None),
        };

        Ok(Self {
            client,
            username,
            password,
            retry: config.retry.clone(),
        })
    }

    async fn get_once(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        download_with_retry(&self.retry, || self.get_once(url)).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(auth: Option<AuthConfig>) -> Config {
        let mut config = Config::default();
        config.auth = auth;
        config.download.request_timeout = Duration::from_millis(500);
        config.retry = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        config
    }

    #[tokio::test]
    async fn fetches_body_with_basic_auth() {
        let server = MockServer::start().await;
        // "user:secret" base64-encoded
        Mock::given(method("GET"))
            .and(path("/export/freexml/EN/1.xml"))
            .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ICECAT-interface/>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config(Some(AuthConfig {
            username: "user".to_string(),
            password: Some("secret".to_string()),
        })))
        .unwrap();

        let body = fetcher
            .fetch_bytes(&format!("{}/export/freexml/EN/1.xml", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"<ICECAT-interface/>");
    }

    #[tokio::test]
    async fn fetch_writes_destination_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<Product/>".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("000001-2.xml");
        let fetcher = HttpFetcher::new(&config(None)).unwrap();
        let stored = fetcher
            .fetch(&format!("{}/2.xml", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(stored, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"<Product/>");
    }

    #[tokio::test]
    async fn not_found_is_http_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config(None)).unwrap();
        let url = format!("{}/missing.xml", server.uri());
        match fetcher.fetch_bytes(&url).await {
            Err(Error::Http { status, url: failed }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config(None)).unwrap();
        let result = fetcher.fetch_bytes(&format!("{}/busy.xml", server.uri())).await;
        assert!(matches!(result, Err(Error::Http { status: 503, .. })));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut cfg = config(None);
        cfg.retry.max_attempts = 0;
        let fetcher = HttpFetcher::new(&cfg).unwrap();
        let result = fetcher.fetch_bytes(&format!("{}/slow.xml", server.uri())).await;
        assert!(matches!(result, Err(Error::Network(e)) if e.is_timeout()));
    }

    #[tokio::test]
    async fn write_failure_names_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<x/>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no_such_dir").join("1.xml");
        let fetcher = HttpFetcher::new(&config(None)).unwrap();
        let result = fetcher.fetch(&format!("{}/1.xml", server.uri()), &dest).await;
        assert!(matches!(result, Err(Error::File { path, .. }) if path == dest));
    }
}
