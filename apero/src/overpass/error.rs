//! Query engine error type.

use thiserror::Error;

/// Errors surfaced by the query engine.
///
/// Payloads are plain strings so the type stays `Clone` — required because a
/// single failure may be delivered to every subscriber of a shared in-flight
/// operation. [`QueryError::TooManyRequests`] is kept distinct from generic
/// failures so callers can advise the user to wait rather than retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Every attempted endpoint answered with a too-many-requests status.
    #[error("the map-data service is saturated, try again in a moment")]
    TooManyRequests,

    /// A non-ok, non-429 HTTP status ended the final attempt.
    #[error("HTTP {status} from {endpoint}")]
    Http { status: u16, endpoint: String },

    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The service answered 200 with a payload we could not decode.
    #[error("invalid response payload: {0}")]
    InvalidResponse(String),
}

impl QueryError {
    /// True when the sensible user advice is "wait", not "retry now".
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, QueryError::TooManyRequests)
    }
}
