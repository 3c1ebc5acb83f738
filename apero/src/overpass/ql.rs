//! Overpass QL query construction.
//!
//! Builds the structured-query text POSTed to the service. Every requested
//! category contributes one `node` and one `way` clause per tag predicate in
//! its closed table, scoped either by a radius around an origin or by a
//! city's bounding rectangle.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::geo::{BoundingBox, Coordinates};
use crate::venue::Category;

/// Radius applied around a city centroid when the resolver supplied no
/// bounding rectangle, in kilometers.
pub const CITY_FALLBACK_RADIUS_KM: f64 = 20.0;

/// The area a query is scoped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryArea {
    /// Circular radius around an origin.
    Around {
        center: Coordinates,
        radius_m: f64,
    },
    /// Rectangular region, used for city-mode searches.
    Bounds(BoundingBox),
}

impl QueryArea {
    /// Circular area from a radius given in kilometers.
    pub fn around_km(center: Coordinates, radius_km: f64) -> Self {
        QueryArea::Around {
            center,
            radius_m: radius_km * 1000.0,
        }
    }

    /// Renders the QL scope suffix for a single clause.
    fn scope(&self) -> String {
        match self {
            QueryArea::Around { center, radius_m } => {
                format!("(around:{:.0},{:.6},{:.6})", radius_m, center.lat, center.lon)
            }
            QueryArea::Bounds(bbox) => format!(
                "({:.6},{:.6},{:.6},{:.6})",
                bbox.south, bbox.west, bbox.north, bbox.east
            ),
        }
    }
}

/// Builds the Overpass QL text for the requested categories in `area`.
///
/// An empty category set produces a structurally valid query whose union is
/// empty; the service answers it with zero elements.
pub fn build_query(area: &QueryArea, categories: &BTreeSet<Category>) -> String {
    let scope = area.scope();
    let mut query = String::from("[out:json][timeout:25];(");

    for category in categories {
        for (key, value) in category.tag_filters() {
            for geometry in ["node", "way"] {
                // e.g. node["amenity"="bar"](around:5000,48.856600,2.352200);
                let _ = write!(query, "{}[\"{}\"=\"{}\"]{};", geometry, key, value, scope);
            }
        }
    }

    query.push_str(");out center;");
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> Coordinates {
        Coordinates::new(48.8566, 2.3522).unwrap()
    }

    #[test]
    fn test_single_category_emits_node_and_way_per_predicate() {
        let categories: BTreeSet<_> = [Category::Bar].into_iter().collect();
        let query = build_query(&QueryArea::around_km(paris(), 5.0), &categories);

        // bar has two predicates (amenity=bar, amenity=pub), each as node+way
        assert_eq!(query.matches("node[").count(), 2);
        assert_eq!(query.matches("way[").count(), 2);
        assert!(query.contains("node[\"amenity\"=\"bar\"]"));
        assert!(query.contains("way[\"amenity\"=\"pub\"]"));
    }

    #[test]
    fn test_radius_km_converted_to_meters() {
        let categories: BTreeSet<_> = [Category::Restaurant].into_iter().collect();
        let query = build_query(&QueryArea::around_km(paris(), 5.0), &categories);
        assert!(query.contains("(around:5000,48.856600,2.352200)"));
    }

    #[test]
    fn test_bounding_box_scope() {
        let bbox = BoundingBox::new(48.81, 2.22, 48.90, 2.47);
        let categories: BTreeSet<_> = [Category::Nightclub].into_iter().collect();
        let query = build_query(&QueryArea::Bounds(bbox), &categories);
        assert!(query.contains("(48.810000,2.220000,48.900000,2.470000)"));
    }

    #[test]
    fn test_absent_category_emits_no_clause() {
        let categories: BTreeSet<_> = [Category::Bar].into_iter().collect();
        let query = build_query(&QueryArea::around_km(paris(), 1.0), &categories);
        assert!(!query.contains("restaurant"));
        assert!(!query.contains("shop"));
    }

    #[test]
    fn test_empty_set_is_structurally_valid() {
        let query = build_query(&QueryArea::around_km(paris(), 1.0), &BTreeSet::new());
        assert_eq!(query, "[out:json][timeout:25];();out center;");
    }

    #[test]
    fn test_envelope_and_output_directives() {
        let categories: BTreeSet<_> = [Category::Supermarket].into_iter().collect();
        let query = build_query(&QueryArea::around_km(paris(), 2.0), &categories);
        assert!(query.starts_with("[out:json][timeout:25];("));
        // `out center;` is what makes way centroids available to the mapper
        assert!(query.ends_with(");out center;"));
    }
}
