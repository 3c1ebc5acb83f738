//! Overpass JSON envelope and venue mapping.
//!
//! Decodes the response envelope and maps raw elements into [`Venue`]
//! records. Mapping is lossy on purpose: elements without descriptive tags,
//! without a usable position, or outside the closed category table are
//! dropped rather than reported.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::geo::Coordinates;
use crate::venue::{open_from_tags, Category, Venue};

/// Top-level response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// One raw element, tagged `node`, `way`, or `relation`.
///
/// Nodes carry their own coordinates; extended geometries carry a computed
/// `center` when the query requests `out center`.
#[derive(Debug, Clone, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub center: Option<Center>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

/// Computed centroid of an extended geometry.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

impl Element {
    /// Position of the element: its own coordinates for points, the computed
    /// centroid otherwise.
    fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => self.center.map(|c| (c.lat, c.lon)),
        }
    }
}

/// Maps one element into a venue, or `None` when the element lacks tags, a
/// known category, or a usable position.
fn venue_from_element(element: Element) -> Option<Venue> {
    let (lat, lon) = element.position()?;
    let tags = element.tags?;
    let category = Category::from_tags(&tags)?;
    let position = Coordinates::new(lat, lon).ok()?;

    let name = Venue::display_name(&tags, category);
    let open = open_from_tags(&tags);
    let city = tags.get("addr:city").cloned();

    Some(Venue {
        id: format!("{}-{}", element.kind, element.id),
        name,
        category,
        position,
        open,
        city,
        tags,
    })
}

/// Maps a decoded envelope into venues, dropping unmappable elements.
pub fn venues_from_envelope(envelope: Envelope) -> Vec<Venue> {
    envelope
        .elements
        .into_iter()
        .filter_map(venue_from_element)
        .collect()
}
