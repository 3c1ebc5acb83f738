//! Search engine configuration.
//!
//! All knobs default to the values the public Overpass mirrors tolerate and
//! can be overridden from the environment at composition time. Unparsable
//! environment values fall back to the default with a warning rather than
//! failing startup.

use std::time::Duration;

use tracing::warn;

use crate::overpass::DEFAULT_ENDPOINTS;

/// Minimum spacing between physical requests.
pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(2000);

/// Length of the sliding rate window.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_millis(10_000);

/// Maximum granted slots per sliding window.
pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: usize = 3;

/// Base delay of the 429 backoff schedule.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(800);

/// Lifetime of a cached response.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Configuration for [`crate::search::VenueSearch`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Minimum spacing between physical requests.
    pub min_request_interval: Duration,
    /// Length of the sliding rate window.
    pub rate_window: Duration,
    /// Maximum granted slots per sliding window.
    pub max_requests_per_window: usize,
    /// Base delay of the 429 backoff schedule.
    pub backoff_base: Duration,
    /// Lifetime of a cached response.
    pub cache_ttl: Duration,
    /// Service endpoints, in rotation order.
    pub endpoints: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_request_interval: DEFAULT_MIN_REQUEST_INTERVAL,
            rate_window: DEFAULT_RATE_WINDOW,
            max_requests_per_window: DEFAULT_MAX_REQUESTS_PER_WINDOW,
            backoff_base: DEFAULT_BACKOFF_BASE,
            cache_ttl: DEFAULT_CACHE_TTL,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl SearchConfig {
    /// Reads the configuration from the environment, falling back to the
    /// defaults for anything unset.
    ///
    /// Recognized variables: `APERO_MIN_REQUEST_INTERVAL_MS`,
    /// `APERO_RATE_WINDOW_MS`, `APERO_MAX_REQUESTS_PER_WINDOW`,
    /// `APERO_BACKOFF_BASE_MS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("APERO_MIN_REQUEST_INTERVAL_MS") {
            config.min_request_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("APERO_RATE_WINDOW_MS") {
            config.rate_window = Duration::from_millis(ms);
        }
        if let Some(count) = env_u64("APERO_MAX_REQUESTS_PER_WINDOW") {
            config.max_requests_per_window = count as usize;
        }
        if let Some(ms) = env_u64("APERO_BACKOFF_BASE_MS") {
            config.backoff_base = Duration::from_millis(ms);
        }
        config
    }

    /// Overrides the endpoint rotation order.
    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Overrides the cache lifetime.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Overrides the rate-limiter thresholds.
    pub fn with_rate_limits(
        mut self,
        min_interval: Duration,
        window: Duration,
        max_per_window: usize,
    ) -> Self {
        self.min_request_interval = min_interval;
        self.rate_window = window;
        self.max_requests_per_window = max_per_window;
        self
    }
}

/// Reads a numeric environment variable, warning on garbage.
fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, %raw, "ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_etiquette() {
        let config = SearchConfig::default();
        assert_eq!(config.min_request_interval, Duration::from_millis(2000));
        assert_eq!(config.rate_window, Duration::from_millis(10_000));
        assert_eq!(config.max_requests_per_window, 3);
        assert_eq!(config.backoff_base, Duration::from_millis(800));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.endpoints.len(), 3);
    }

    #[test]
    fn test_builders_override_fields() {
        let config = SearchConfig::default()
            .with_endpoints(vec!["http://mirror".to_string()])
            .with_cache_ttl(Duration::from_secs(1))
            .with_rate_limits(Duration::ZERO, Duration::from_secs(1), 9);
        assert_eq!(config.endpoints, ["http://mirror"]);
        assert_eq!(config.cache_ttl, Duration::from_secs(1));
        assert_eq!(config.max_requests_per_window, 9);
    }
}
