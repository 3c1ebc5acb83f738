//! Apero - nearby-venue search with a compass heading core
//!
//! This library provides the two cores behind the Apero venue finder:
//!
//! - [`search`] - a rate-limited, cache-and-dedupe query engine over the
//!   Overpass map-data service, with multi-endpoint failover ([`overpass`]
//!   holds the wire protocol it speaks).
//! - [`heading`] - a device-heading estimator fusing raw orientation and
//!   motion sensor samples into a stabilized compass heading.
//!
//! The two cores do not interact. The UI shell composes them: it feeds a
//! location and filters into [`search::VenueSearch`] and receives venue
//! lists; it toggles [`heading::HeadingTracker`] and receives a heading
//! stream. Collaborators the cores depend on (location fixes, city name
//! resolution) are defined as traits in [`location`].

pub mod geo;
pub mod heading;
pub mod location;
pub mod overpass;
pub mod search;
pub mod venue;

pub use geo::{BoundingBox, Coordinates};
pub use search::{SearchConfig, SearchRequest, VenueSearch};
pub use venue::{Category, Venue};
