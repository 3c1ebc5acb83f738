//! External collaborator interfaces
//!
//! The query engine and UI shell depend on two collaborators that live
//! outside this crate's scope: a device location provider and a free-text
//! city resolver. Both are defined here as traits so the application injects
//! platform implementations and tests inject fixtures.

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::geo::{BoundingBox, Coordinates};

/// Errors from the device location provider, by cause.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for a position fix")]
    Timeout,
}

/// Accuracy/recency/timeout knobs for a fix request.
#[derive(Debug, Clone, Copy)]
pub struct LocationRequest {
    pub high_accuracy: bool,
    /// Oldest acceptable cached fix.
    pub maximum_age: Duration,
    pub timeout: Duration,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Source of device position fixes.
pub trait LocationProvider: Send + Sync {
    /// Resolves a single fix.
    fn one_shot(
        &self,
        request: &LocationRequest,
    ) -> BoxFuture<'_, Result<Coordinates, LocationError>>;

    /// Starts continuous watching, delivering fixes and errors into `sink`
    /// until [`LocationProvider::clear_watch`] is called.
    fn watch(
        &self,
        request: &LocationRequest,
        sink: mpsc::UnboundedSender<Result<Coordinates, LocationError>>,
    ) -> Result<(), LocationError>;

    /// Stops a continuous watch. Idempotent.
    fn clear_watch(&self);
}

/// Errors from city-name resolution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// The resolver found nothing for the given text.
    #[error("no city matches \"{0}\"")]
    NoMatch(String),
    #[error("city resolution failed: {0}")]
    Backend(String),
}

/// One ranked geocoding match.
#[derive(Debug, Clone, PartialEq)]
pub struct CityMatch {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Rectangle covering the city, when the resolver knows it.
    pub bounding_box: Option<BoundingBox>,
    /// Resolver-assigned rank, higher is better.
    pub importance: f64,
}

impl CityMatch {
    /// Centroid of the match.
    pub fn center(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// Free-text city resolution, used for autocomplete and best-match lookup.
pub trait CityResolver: Send + Sync {
    /// Ranked matches for `text`, best first, at most `limit`.
    fn suggest(
        &self,
        text: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<CityMatch>, ResolveError>>;
}

/// Resolves the single best match for `text`.
pub async fn resolve_best(
    resolver: &dyn CityResolver,
    text: &str,
) -> Result<CityMatch, ResolveError> {
    let mut matches = resolver.suggest(text, 1).await?;
    if matches.is_empty() {
        return Err(ResolveError::NoMatch(text.to_string()));
    }
    Ok(matches.remove(0))
}

/// Fixture resolver serving a fixed match list, for tests and composition
/// without a geocoding backend.
#[derive(Debug, Clone, Default)]
pub struct StaticCityResolver {
    matches: Vec<CityMatch>,
}

impl StaticCityResolver {
    pub fn new(matches: Vec<CityMatch>) -> Self {
        Self { matches }
    }
}

impl CityResolver for StaticCityResolver {
    fn suggest(
        &self,
        text: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<CityMatch>, ResolveError>> {
        let needle = text.to_lowercase();
        let matches: Vec<CityMatch> = self
            .matches
            .iter()
            .filter(|m| m.name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect();
        Box::pin(async move { Ok(matches) })
    }
}

/// Fixture provider answering every one-shot request with a fixed position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationProvider(pub Coordinates);

impl LocationProvider for FixedLocationProvider {
    fn one_shot(
        &self,
        _request: &LocationRequest,
    ) -> BoxFuture<'_, Result<Coordinates, LocationError>> {
        let position = self.0;
        Box::pin(async move { Ok(position) })
    }

    fn watch(
        &self,
        _request: &LocationRequest,
        sink: mpsc::UnboundedSender<Result<Coordinates, LocationError>>,
    ) -> Result<(), LocationError> {
        let _ = sink.send(Ok(self.0));
        Ok(())
    }

    fn clear_watch(&self) {}
}
