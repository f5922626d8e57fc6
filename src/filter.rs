//! Duplicate and reachability filter run before classification.
//!
//! The duplicate lookup always runs first: it is a local query, while the
//! reachability check costs a network round trip.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::Database;
use crate::util::UrlPolicy;

/// Best-effort liveness check for an article URL
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self, url: &str, timeout: Duration) -> bool;
}

/// HEAD first; any non-200 answer retries as a streamed GET whose body is
/// never read. Only a final 200 counts as reachable. Redirects are followed.
#[derive(Clone)]
pub struct HttpReachability {
    client: reqwest::Client,
    url_policy: UrlPolicy,
}

impl HttpReachability {
    pub fn new(client: reqwest::Client, url_policy: UrlPolicy) -> Self {
        Self { client, url_policy }
    }
}

#[async_trait]
impl Reachability for HttpReachability {
    async fn is_reachable(&self, url: &str, timeout: Duration) -> bool {
        let url = match self.url_policy.validate(url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Article URL refused by policy");
                return false;
            }
        };

        let head = tokio::time::timeout(timeout, self.client.head(url.clone()).send()).await;
        match head {
            Ok(Ok(response)) if response.status() == reqwest::StatusCode::OK => return true,
            Ok(Ok(response)) => {
                tracing::debug!(url = %url, status = %response.status(), "HEAD not OK, trying GET");
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "HEAD request failed");
                return false;
            }
            Err(_) => {
                tracing::debug!(url = %url, "HEAD request timed out");
                return false;
            }
        }

        // Response is dropped unread; only the status line matters
        match tokio::time::timeout(timeout, self.client.get(url.clone()).send()).await {
            Ok(Ok(response)) => response.status() == reqwest::StatusCode::OK,
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "GET request failed");
                false
            }
            Err(_) => {
                tracing::debug!(url = %url, "GET request timed out");
                false
            }
        }
    }
}

/// Outcome of the filter for one article URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// Already persisted
    Duplicate,
    /// Dead at ingestion time
    Unreachable,
}

impl Admission {
    pub fn is_accepted(self) -> bool {
        self == Admission::Accept
    }
}

/// `accept(article_url)` gate: duplicate check, then optional reachability.
#[derive(Clone)]
pub struct AdmissionFilter {
    db: Database,
    reachability: Option<Arc<dyn Reachability>>,
    timeout: Duration,
}

impl AdmissionFilter {
    /// `reachability: None` disables the network check
    pub fn new(db: Database, reachability: Option<Arc<dyn Reachability>>, timeout: Duration) -> Self {
        Self {
            db,
            reachability,
            timeout,
        }
    }

    /// Store errors propagate; they fail the entry, not the run.
    pub async fn admit(&self, article_url: &str) -> Result<Admission> {
        if self.db.content_exists(article_url).await? {
            return Ok(Admission::Duplicate);
        }

        if let Some(reachability) = &self.reachability {
            if !reachability.is_reachable(article_url, self.timeout).await {
                return Ok(Admission::Unreachable);
            }
        }

        Ok(Admission::Accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewContent, SourceSeed};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> HttpReachability {
        HttpReachability::new(
            reqwest::Client::new(),
            UrlPolicy {
                allow_private_hosts: true,
            },
        )
    }

    #[tokio::test]
    async fn test_head_ok_is_reachable() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/post", server.uri());
        assert!(http().is_reachable(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_head_unsupported_falls_back_to_get() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/post", server.uri());
        assert!(http().is_reachable(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_not_found_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/gone", server.uri());
        assert!(!http().is_reachable(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let url = format!("{}/slow", server.uri());
        assert!(!http().is_reachable(&url, Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_policy_violation_is_unreachable() {
        let strict = HttpReachability::new(reqwest::Client::new(), UrlPolicy::PUBLIC_ONLY);
        assert!(!strict.is_reachable("http://10.0.0.1/a", Duration::from_secs(1)).await);
        assert!(!strict.is_reachable("ftp://example.com/a", Duration::from_secs(1)).await);
    }

    struct CountingReachability(AtomicUsize);

    #[async_trait]
    impl Reachability for CountingReachability {
        async fn is_reachable(&self, _: &str, _: Duration) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn test_duplicate_check_runs_before_reachability() {
        let db = Database::open(Database::IN_MEMORY).await.unwrap();
        db.sync_sources(&[SourceSeed {
            name: "Feed".into(),
            feed_url: "https://feed.example/rss".into(),
        }])
        .await
        .unwrap();
        let source_id = db.list_sources().await.unwrap()[0].id;
        db.insert_content(&NewContent {
            source_id,
            title: "Known".into(),
            excerpt: String::new(),
            article_url: "https://a.example/known".into(),
            published_at: 1_700_000_000,
            topic: "Open Source".into(),
            image_url: None,
        })
        .await
        .unwrap();

        let reachability = Arc::new(CountingReachability(AtomicUsize::new(0)));
        let dyn_reachability: Arc<dyn Reachability> = reachability.clone();
        let filter = AdmissionFilter::new(db, Some(dyn_reachability), Duration::from_secs(1));

        assert_eq!(
            filter.admit("https://a.example/known").await.unwrap(),
            Admission::Duplicate
        );
        assert_eq!(reachability.0.load(Ordering::SeqCst), 0);

        assert_eq!(
            filter.admit("https://a.example/new").await.unwrap(),
            Admission::Accept
        );
        assert_eq!(reachability.0.load(Ordering::SeqCst), 1);
    }
}
