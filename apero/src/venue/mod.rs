//! Venue data model
//!
//! Defines the closed category enumeration with its OSM tag table, and the
//! immutable [`Venue`] record produced by the query engine. Venues carry no
//! cross-request identity beyond their key: re-fetching may yield a
//! structurally different record under the same key, and callers replace
//! rather than merge.

use std::collections::BTreeMap;
use std::fmt;

use crate::geo::Coordinates;

/// The closed set of venue categories the application understands.
///
/// Raw map records whose tags match none of the predicates in
/// [`Category::tag_filters`] are dropped during response mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Bar,
    WineCellar,
    Nightclub,
    Supermarket,
    Restaurant,
    LiquorStore,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 6] = [
        Category::Bar,
        Category::WineCellar,
        Category::Nightclub,
        Category::Supermarket,
        Category::Restaurant,
        Category::LiquorStore,
    ];

    /// The OSM tag predicates that map onto this category.
    ///
    /// This is a closed table: adding a predicate here is the only way to
    /// widen a category.
    pub fn tag_filters(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Category::Bar => &[("amenity", "bar"), ("amenity", "pub")],
            Category::WineCellar => &[("shop", "wine")],
            Category::Nightclub => &[("amenity", "nightclub")],
            Category::Supermarket => &[("shop", "supermarket"), ("shop", "convenience")],
            Category::Restaurant => &[("amenity", "restaurant")],
            Category::LiquorStore => &[("shop", "alcohol"), ("shop", "beverages")],
        }
    }

    /// Stable identifier used in cache keys and CLI arguments.
    pub fn slug(&self) -> &'static str {
        match self {
            Category::Bar => "bar",
            Category::WineCellar => "wine-cellar",
            Category::Nightclub => "nightclub",
            Category::Supermarket => "supermarket",
            Category::Restaurant => "restaurant",
            Category::LiquorStore => "liquor-store",
        }
    }

    /// Human-readable label, used in the unnamed-venue fallback.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Bar => "Bar",
            Category::WineCellar => "Cave à vin",
            Category::Nightclub => "Club",
            Category::Supermarket => "Supermarché",
            Category::Restaurant => "Restaurant",
            Category::LiquorStore => "Caviste",
        }
    }

    /// Parses a slug back into a category.
    pub fn from_slug(slug: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.slug() == slug)
    }

    /// Maps a raw tag set onto a category, or `None` when no predicate in
    /// the closed table matches.
    pub fn from_tags(tags: &BTreeMap<String, String>) -> Option<Category> {
        for category in Category::ALL {
            for (key, value) in category.tag_filters() {
                if tags.get(*key).map(String::as_str) == Some(*value) {
                    return Some(category);
                }
            }
        }
        None
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// A venue returned by the query engine.
///
/// Identity is `"{element kind}-{element id}"`, stable across fetches on the
/// map-data side. The record itself is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Venue {
    /// Stable external key, `"node-123"` / `"way-456"`.
    pub id: String,
    /// Display name; unnamed venues get `"<label> sans nom"`.
    pub name: String,
    pub category: Category,
    pub position: Coordinates,
    /// Open/closed as derived from the schedule tag; see [`open_from_tags`].
    pub open: bool,
    pub city: Option<String>,
    /// Raw attribute map as delivered by the map-data service.
    pub tags: BTreeMap<String, String>,
}

impl Venue {
    /// Display name for a possibly unnamed venue.
    pub fn display_name(tags: &BTreeMap<String, String>, category: Category) -> String {
        match tags.get("name") {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{} sans nom", category.label()),
        }
    }
}

/// Derives open/closed from the `opening_hours` tag.
///
/// No schedule tag means open, and `24/7` means open. Every other schedule
/// value is currently also treated as open: parsing schedule strings against
/// the current time is an accepted limitation, not an oversight, and this
/// function is the single seam where parsing would slot in.
pub fn open_from_tags(tags: &BTreeMap<String, String>) -> bool {
    match tags.get("opening_hours").map(String::as_str) {
        None => true,
        Some("24/7") => true,
        Some(_) => true,
    }
}
