use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, ParseResult};
use super::FeedFetcher;
use crate::content::Entry;
use crate::storage::Source;
use crate::util::{UrlPolicy, UrlValidationError};

const MAX_RETRIES: u32 = 3;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching one source.
///
/// Every variant is recoverable at the run level: the source is dropped from
/// the current run and retried on the next one.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Feed document could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    #[error("Feed URL rejected: {0}")]
    InvalidUrl(#[from] UrlValidationError),
}

/// Fetches feeds over HTTP with bounded retries.
///
/// - 429 and 5xx responses back off exponentially (`backoff_base * 2^n`)
///   for up to 3 retries; other non-2xx statuses fail immediately
/// - each attempt (request and body) is bounded by `timeout`
/// - bodies over 10MB are refused
#[derive(Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    backoff_base: Duration,
    url_policy: UrlPolicy,
}

impl HttpFeedFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration, url_policy: UrlPolicy) -> Self {
        Self {
            client,
            timeout,
            backoff_base: Duration::from_secs(1),
            url_policy,
        }
    }

    /// Override the first retry delay (later retries double it)
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    async fn fetch_bytes(&self, source: &Source) -> Result<Vec<u8>, FetchError> {
        let url = self.url_policy.validate(&source.feed_url)?;
        let mut retry_count = 0;

        loop {
            let attempt = async {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }
                read_limited_bytes(response, MAX_FEED_SIZE).await
            };

            let result = tokio::time::timeout(self.timeout, attempt)
                .await
                .unwrap_or(Err(FetchError::Timeout));

            let err = match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) => e,
            };

            let retryable = match &err {
                FetchError::HttpStatus(429) => {
                    if retry_count >= MAX_RETRIES {
                        return Err(FetchError::RateLimited(MAX_RETRIES));
                    }
                    true
                }
                FetchError::HttpStatus(status) => (500..600).contains(status),
                FetchError::IncompleteResponse { .. } => true,
                _ => false,
            };

            if !retryable || retry_count >= MAX_RETRIES {
                return Err(err);
            }

            let delay = self.backoff_base * 2u32.pow(retry_count);
            tracing::warn!(
                source_id = source.id,
                feed = %source.feed_url,
                retry = retry_count + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Feed fetch failed, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source: &Source, limit: usize) -> Result<Vec<Entry>, FetchError> {
        let bytes = self.fetch_bytes(source).await?;

        let ParseResult { entries, skipped } =
            parse_feed(&bytes, limit).map_err(|e| FetchError::Parse(e.to_string()))?;

        if skipped > 0 {
            tracing::debug!(
                source_id = source.id,
                skipped = skipped,
                "Entries without a usable link skipped"
            );
        }

        Ok(entries)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>First</title><link>https://example.com/1</link></item>
    <item><title>Second</title><link>https://example.com/2</link></item>
</channel></rss>"#;

    fn fetcher() -> HttpFeedFetcher {
        HttpFeedFetcher::new(
            reqwest::Client::new(),
            Duration::from_secs(5),
            UrlPolicy {
                allow_private_hosts: true,
            },
        )
        .with_backoff_base(Duration::from_millis(1))
    }

    fn source(url: String) -> Source {
        Source {
            id: 1,
            name: "Test".into(),
            feed_url: url,
            last_fetched_at: None,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let entries = fetcher()
            .fetch(&source(format!("{}/feed", mock_server.uri())), 10)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_limit_applied() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let entries = fetcher()
            .fetch(&source(format!("{}/feed", mock_server.uri())), 1)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_404_fails_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = fetcher()
            .fetch(&source(format!("{}/feed", mock_server.uri())), 10)
            .await;
        match result {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other.map(|e| e.len())),
        }
    }

    #[tokio::test]
    async fn test_500_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4) // Initial request + 3 retries
            .mount(&mock_server)
            .await;

        let result = fetcher()
            .fetch(&source(format!("{}/feed", mock_server.uri())), 10)
            .await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_429_exhausts_to_rate_limited() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&mock_server)
            .await;

        let result = fetcher()
            .fetch(&source(format!("{}/feed", mock_server.uri())), 10)
            .await;
        assert!(matches!(result, Err(FetchError::RateLimited(3))));
    }

    #[tokio::test]
    async fn test_503_retry_then_success() {
        let mock_server = MockServer::start().await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let entries = fetcher()
            .fetch(&source(format!("{}/feed", mock_server.uri())), 10)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let result = fetcher()
            .fetch(&source(format!("{}/feed", mock_server.uri())), 10)
            .await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFeedFetcher::new(
            reqwest::Client::new(),
            Duration::from_millis(100),
            UrlPolicy {
                allow_private_hosts: true,
            },
        );
        let result = fetcher
            .fetch(&source(format!("{}/feed", mock_server.uri())), 10)
            .await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_private_host_refused_by_default_policy() {
        let fetcher = HttpFeedFetcher::new(
            reqwest::Client::new(),
            Duration::from_secs(1),
            UrlPolicy::PUBLIC_ONLY,
        );
        let result = fetcher
            .fetch(&source("http://127.0.0.1:9/feed".into()), 10)
            .await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
