//! The venue search service.
//!
//! Resolves each request from the response cache, then from an identical
//! in-flight operation, then from a fresh network fetch, in that order. The
//! network fetch runs in its own task: callers that stop awaiting do not
//! cancel it, and its cache write becomes visible to later callers either
//! way.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::cache::ResponseCache;
use super::config::SearchConfig;
use super::metrics::SearchMetrics;
use super::rate_limit::{RateLimitSettings, RateLimiter};
use crate::geo::Coordinates;
use crate::location::CityMatch;
use crate::overpass::{
    build_query, venues_from_envelope, HttpTransport, OverpassClient, QueryArea, QueryError,
    CITY_FALLBACK_RADIUS_KM,
};
use crate::venue::{Category, Venue};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Vec<Venue>>, QueryError>>>;

/// How the search area is scoped.
#[derive(Debug, Clone)]
pub enum SearchMode {
    /// Circular radius around the device position.
    Proximity { origin: Coordinates, radius_km: f64 },
    /// A resolved city; its bounding rectangle when known, else a fixed
    /// radius around the centroid.
    City(CityMatch),
}

/// One search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub mode: SearchMode,
    pub categories: BTreeSet<Category>,
}

impl SearchRequest {
    /// Proximity request from an origin and radius in kilometers.
    pub fn around(origin: Coordinates, radius_km: f64, categories: BTreeSet<Category>) -> Self {
        Self {
            mode: SearchMode::Proximity { origin, radius_km },
            categories,
        }
    }

    /// City-mode request from a resolved match.
    pub fn in_city(city: CityMatch, categories: BTreeSet<Category>) -> Self {
        Self {
            mode: SearchMode::City(city),
            categories,
        }
    }

    /// Deterministic cache key.
    ///
    /// Proximity mode rounds coordinates to 2 decimal places (roughly a 1 km
    /// grid), so nearby origins share an entry; city mode keys on the name.
    /// Category slugs come from a sorted set, making the key order-free.
    pub fn cache_key(&self) -> String {
        let categories: Vec<&str> = self.categories.iter().map(Category::slug).collect();
        let categories = categories.join("+");
        match &self.mode {
            SearchMode::Proximity { origin, radius_km } => format!(
                "around:{:.2}:{:.2}:{}:{}",
                origin.lat, origin.lon, radius_km, categories
            ),
            SearchMode::City(city) => {
                format!("city:{}:{}", city.name.to_lowercase(), categories)
            }
        }
    }

    /// The query area this request scopes to.
    fn area(&self) -> QueryArea {
        match &self.mode {
            SearchMode::Proximity { origin, radius_km } => {
                QueryArea::around_km(*origin, *radius_km)
            }
            SearchMode::City(city) => match city.bounding_box {
                Some(bbox) => QueryArea::Bounds(bbox),
                None => QueryArea::around_km(city.center(), CITY_FALLBACK_RADIUS_KM),
            },
        }
    }
}

/// The venue search service.
///
/// Constructed once at application start; every collaborator receives a
/// reference. Cache, limiter window, endpoint cursor, and pending operations
/// all live inside the instance.
pub struct VenueSearch {
    cache: Arc<ResponseCache>,
    client: Arc<OverpassClient>,
    pending: Arc<DashMap<String, SharedFetch>>,
    metrics: Arc<SearchMetrics>,
}

impl VenueSearch {
    /// Builds the service from configuration and an HTTP transport.
    pub fn new(config: SearchConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let limiter = Arc::new(RateLimiter::new(RateLimitSettings {
            min_interval: config.min_request_interval,
            window: config.rate_window,
            max_per_window: config.max_requests_per_window,
        }));
        let client = Arc::new(OverpassClient::new(
            transport,
            config.endpoints,
            limiter,
            config.backoff_base,
        ));
        Self {
            cache: Arc::new(ResponseCache::new(config.cache_ttl)),
            client,
            pending: Arc::new(DashMap::new()),
            metrics: Arc::new(SearchMetrics::new()),
        }
    }

    /// Resolves a request from cache, an in-flight share, or the network.
    pub async fn search(&self, request: &SearchRequest) -> Result<Arc<Vec<Venue>>, QueryError> {
        let key = request.cache_key();

        if let Some(hit) = self.cache.get(&key) {
            self.metrics.cache_hit();
            debug!(%key, "cache hit");
            return Ok(hit);
        }
        self.metrics.cache_miss();

        let fetch = match self.pending.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                self.metrics.dedup_join();
                debug!(%key, "joining in-flight request");
                entry.get().clone()
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let fetch = self.start_fetch(key, request.area(), request.categories.clone());
                slot.insert(fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    /// Spawns the network fetch as an owned task.
    ///
    /// The task, not the caller, removes its pending-map entry when it
    /// settles, so abandoning callers never strand the map and the cache
    /// write completes regardless of who is still awaiting.
    fn start_fetch(
        &self,
        key: String,
        area: QueryArea,
        categories: BTreeSet<Category>,
    ) -> SharedFetch {
        let cache = Arc::clone(&self.cache);
        let client = Arc::clone(&self.client);
        let metrics = Arc::clone(&self.metrics);
        let pending = Arc::clone(&self.pending);

        let handle = tokio::spawn(async move {
            metrics.fetch_started();
            cache.purge_expired();
            let query = build_query(&area, &categories);
            let result = match client.fetch(&query).await {
                Ok(envelope) => {
                    let venues = Arc::new(venues_from_envelope(envelope));
                    cache.insert(key.clone(), Arc::clone(&venues));
                    Ok(venues)
                }
                Err(error) => {
                    metrics.fetch_failed();
                    Err(error)
                }
            };
            pending.remove(&key);
            result
        });

        let fetch: BoxFuture<'static, Result<Arc<Vec<Venue>>, QueryError>> =
            Box::pin(async move {
                match handle.await {
                    Ok(result) => result,
                    Err(join_error) => Err(QueryError::Network(format!(
                        "search task aborted: {}",
                        join_error
                    ))),
                }
            });
        fetch.shared()
    }

    /// Counters for display.
    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// The response cache, exposed for composition-level maintenance.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}
