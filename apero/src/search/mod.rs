//! Venue search engine
//!
//! The service object composing the query layer: a response cache with
//! expiry, FIFO rate limiting, in-flight request deduplication with network
//! orchestration, debounced refetch scheduling, environment-driven
//! configuration, and lock-free counters.
//!
//! [`VenueSearch`] is constructed once at application start and passed by
//! reference to every caller; all of its state (cache, limiter window,
//! endpoint cursor, pending operations) lives inside the instance.

mod cache;
mod config;
mod debounce;
mod engine;
mod metrics;
mod rate_limit;

pub use cache::ResponseCache;
pub use config::SearchConfig;
pub use debounce::Debouncer;
pub use engine::{SearchMode, SearchRequest, VenueSearch};
pub use metrics::{MetricsSnapshot, SearchMetrics};
pub use rate_limit::{RateLimitSettings, RateLimiter};
