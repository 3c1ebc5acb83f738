//! Multi-endpoint failover client.
//!
//! Issues rate-limited POST requests against an ordered list of Overpass
//! mirrors sharing one rotating cursor. A too-many-requests answer backs off
//! exponentially and rotates to the next mirror; other failures rotate
//! immediately (network errors after a fixed base delay). The client gives up
//! after twice as many attempts as there are endpoints and propagates the
//! last observed error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use tracing::{debug, warn};

use super::error::QueryError;
use super::wire::Envelope;
use crate::search::RateLimiter;

/// Public Overpass mirrors, in rotation order.
pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.openstreetmap.ru/api/interpreter",
];

/// Upper bound on the random jitter added to a 429 backoff, in ms.
const BACKOFF_JITTER_MS: u64 = 250;

/// Upper bound on the random jitter added to a network-error retry, in ms.
const NETWORK_RETRY_JITTER_MS: u64 = 100;

/// Exponent cap for the 429 backoff schedule.
const MAX_BACKOFF_EXPONENT: u32 = 4;

/// Status + body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Trait for the HTTP transport.
///
/// This abstraction allows for dependency injection and easier testing by
/// enabling mock transports in tests.
pub trait HttpTransport: Send + Sync {
    /// POSTs a form-encoded `data=<query>` body and returns status + body.
    ///
    /// Transport-level failures map to [`QueryError::Network`]; HTTP error
    /// statuses are returned in the response, not as `Err`.
    fn post_form(&self, url: &str, query: &str) -> BoxFuture<'static, Result<HttpResponse, QueryError>>;
}

/// Real transport implementation using reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with the default 30 second timeout.
    pub fn new() -> Result<Self, QueryError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Creates a transport with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, QueryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_form(&self, url: &str, query: &str) -> BoxFuture<'static, Result<HttpResponse, QueryError>> {
        let client = self.client.clone();
        let url = url.to_string();
        let form = [("data", query.to_string())];
        Box::pin(async move {
            let response = client
                .post(&url)
                .form(&form)
                .send()
                .await
                .map_err(|e| QueryError::Network(format!("request to {} failed: {}", url, e)))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| QueryError::Network(format!("failed to read response: {}", e)))?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Failover client over an ordered endpoint list.
///
/// The rotation cursor is shared across all callers: once a mirror
/// misbehaves, every subsequent request starts from its successor.
pub struct OverpassClient {
    transport: Arc<dyn HttpTransport>,
    endpoints: Vec<String>,
    cursor: AtomicUsize,
    limiter: Arc<RateLimiter>,
    backoff_base: Duration,
}

impl OverpassClient {
    /// Creates a client over `endpoints`, acquiring a slot from `limiter`
    /// before every physical attempt.
    ///
    /// # Panics
    ///
    /// Panics if `endpoints` is empty; the endpoint list is composition-time
    /// configuration, not runtime input.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoints: Vec<String>,
        limiter: Arc<RateLimiter>,
        backoff_base: Duration,
    ) -> Self {
        assert!(!endpoints.is_empty(), "endpoint list must not be empty");
        Self {
            transport,
            endpoints,
            cursor: AtomicUsize::new(0),
            limiter,
            backoff_base,
        }
    }

    /// The endpoint the cursor currently points at.
    fn current_endpoint(&self) -> &str {
        let index = self.cursor.load(Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[index]
    }

    /// Advances the shared cursor to the next endpoint.
    fn rotate(&self) {
        self.cursor.fetch_add(1, Ordering::Relaxed);
    }

    /// Backoff delay for a 429 on the `attempt`-th try (0-based), before
    /// jitter: `base × 2^min(attempt, 4)`.
    fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = (attempt as u32).min(MAX_BACKOFF_EXPONENT);
        self.backoff_base * 2u32.pow(exponent)
    }

    /// Fetches and decodes one query, rotating through endpoints on failure.
    ///
    /// Gives up after `2 × endpoint count` attempts with the last observed
    /// error.
    pub async fn fetch(&self, query: &str) -> Result<Envelope, QueryError> {
        let max_attempts = self.endpoints.len() * 2;
        let mut last_error = QueryError::Network("no endpoint attempted".to_string());

        for attempt in 0..max_attempts {
            self.limiter.acquire().await;

            let endpoint = self.current_endpoint().to_string();
            debug!(endpoint = %endpoint, attempt, "issuing overpass request");

            match self.transport.post_form(&endpoint, query).await {
                Ok(response) if response.status == 200 => {
                    return serde_json::from_str(&response.body)
                        .map_err(|e| QueryError::InvalidResponse(e.to_string()));
                }
                Ok(response) if response.status == 429 => {
                    let delay = self.backoff_delay(attempt) + jitter(BACKOFF_JITTER_MS);
                    warn!(
                        endpoint = %endpoint,
                        delay_ms = delay.as_millis() as u64,
                        "endpoint saturated, backing off and rotating"
                    );
                    last_error = QueryError::TooManyRequests;
                    tokio::time::sleep(delay).await;
                    self.rotate();
                }
                Ok(response) => {
                    warn!(endpoint = %endpoint, status = response.status, "endpoint failed, rotating");
                    last_error = QueryError::Http {
                        status: response.status,
                        endpoint,
                    };
                    self.rotate();
                }
                Err(error) => {
                    warn!(endpoint = %endpoint, %error, "transport error, rotating");
                    last_error = error;
                    tokio::time::sleep(self.backoff_base + jitter(NETWORK_RETRY_JITTER_MS)).await;
                    self.rotate();
                }
            }
        }

        Err(last_error)
    }
}

/// Uniform random delay in `[0, cap_ms]`.
fn jitter(cap_ms: u64) -> Duration {
    Duration::from_millis(rand::rng().random_range(0..=cap_ms))
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::search::RateLimitSettings;
    use parking_lot::Mutex;

    /// Mock transport replaying a script of responses and recording the
    /// endpoints hit.
    pub struct MockTransport {
        script: Mutex<Vec<Result<HttpResponse, QueryError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new(script: Vec<Result<HttpResponse, QueryError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpTransport for MockTransport {
        fn post_form(
            &self,
            url: &str,
            _query: &str,
        ) -> BoxFuture<'static, Result<HttpResponse, QueryError>> {
            self.calls.lock().push(url.to_string());
            let next = if self.script.lock().is_empty() {
                Err(QueryError::Network("script exhausted".to_string()))
            } else {
                self.script.lock().remove(0)
            };
            Box::pin(async move { next })
        }
    }

    fn ok(body: &str) -> Result<HttpResponse, QueryError> {
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn status(code: u16) -> Result<HttpResponse, QueryError> {
        Ok(HttpResponse {
            status: code,
            body: String::new(),
        })
    }

    fn unlimited() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(RateLimitSettings {
            min_interval: Duration::ZERO,
            window: Duration::from_secs(10),
            max_per_window: usize::MAX,
        }))
    }

    fn client(transport: Arc<MockTransport>, endpoints: &[&str]) -> OverpassClient {
        OverpassClient::new(
            transport,
            endpoints.iter().map(|e| e.to_string()).collect(),
            unlimited(),
            Duration::from_millis(50),
        )
    }

    const EMPTY_ENVELOPE: &str = r#"{"elements": []}"#;

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_endpoint() {
        let transport = Arc::new(MockTransport::new(vec![ok(EMPTY_ENVELOPE)]));
        let client = client(Arc::clone(&transport), &["http://a", "http://b"]);

        let envelope = client.fetch("query").await.expect("should succeed");
        assert!(envelope.elements.is_empty());
        assert_eq!(transport.calls.lock().as_slice(), ["http://a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_rotates_to_next_endpoint() {
        let transport = Arc::new(MockTransport::new(vec![status(429), ok(EMPTY_ENVELOPE)]));
        let client = client(Arc::clone(&transport), &["http://a", "http://b"]);

        client.fetch("query").await.expect("second endpoint succeeds");
        assert_eq!(transport.calls.lock().as_slice(), ["http://a", "http://b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_waits_at_least_backoff_base() {
        let transport = Arc::new(MockTransport::new(vec![status(429), ok(EMPTY_ENVELOPE)]));
        let client = client(Arc::clone(&transport), &["http://a", "http://b"]);

        let started = tokio::time::Instant::now();
        client.fetch("query").await.expect("should succeed");
        assert!(
            started.elapsed() >= Duration::from_millis(50),
            "second attempt must wait out the backoff"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_rotates_and_retries() {
        let transport = Arc::new(MockTransport::new(vec![
            Err(QueryError::Network("connection reset".to_string())),
            ok(EMPTY_ENVELOPE),
        ]));
        let client = client(Arc::clone(&transport), &["http://a", "http://b"]);

        client.fetch("query").await.expect("should recover");
        assert_eq!(transport.calls.lock().as_slice(), ["http://a", "http://b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_twice_endpoint_count() {
        let transport = Arc::new(MockTransport::new(vec![
            status(500),
            status(500),
            status(500),
            status(502),
        ]));
        let client = client(Arc::clone(&transport), &["http://a", "http://b"]);

        let error = client.fetch("query").await.expect_err("must give up");
        assert_eq!(transport.calls.lock().len(), 4);
        // the last observed error is what propagates
        assert_eq!(
            error,
            QueryError::Http {
                status: 502,
                endpoint: "http://b".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_saturated_reports_too_many_requests() {
        let transport = Arc::new(MockTransport::new(vec![
            status(429),
            status(429),
            status(429),
            status(429),
        ]));
        let client = client(Arc::clone(&transport), &["http://a", "http://b"]);

        let error = client.fetch("query").await.expect_err("must give up");
        assert!(error.is_rate_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_payload_is_a_typed_error() {
        let transport = Arc::new(MockTransport::new(vec![ok("not json")]));
        let client = client(Arc::clone(&transport), &["http://a"]);

        let error = client.fetch("query").await.expect_err("bad payload");
        assert!(matches!(error, QueryError::InvalidResponse(_)));
    }

    #[test]
    fn test_backoff_schedule_doubles_then_caps() {
        let transport = Arc::new(MockTransport::new(vec![]));
        let client = client(transport, &["http://a"]);

        assert_eq!(client.backoff_delay(0), Duration::from_millis(50));
        assert_eq!(client.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(client.backoff_delay(4), Duration::from_millis(800));
        // exponent capped at 4
        assert_eq!(client.backoff_delay(9), Duration::from_millis(800));
    }
}
