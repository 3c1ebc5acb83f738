//! Apero CLI - find nearby venues from the command line.
//!
//! Thin composition root over the `apero` library: builds the search service
//! from environment configuration, runs one proximity query, and prints the
//! results with distance and bearing from the origin.

use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use apero::overpass::ReqwestTransport;
use apero::{Category, Coordinates, SearchConfig, SearchRequest, VenueSearch};

/// Find nearby bars, restaurants and shops.
#[derive(Debug, Parser)]
#[command(name = "apero", version, about)]
struct Args {
    /// Origin latitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Origin longitude in degrees.
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,

    /// Search radius in kilometers.
    #[arg(long, default_value_t = 2.0)]
    radius_km: f64,

    /// Comma-separated categories (bar, wine-cellar, nightclub, supermarket,
    /// restaurant, liquor-store). Defaults to all of them.
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// Only list venues currently marked open.
    #[arg(long)]
    open_only: bool,
}

fn parse_categories(raw: &[String]) -> Result<BTreeSet<Category>, String> {
    if raw.is_empty() {
        return Ok(Category::ALL.into_iter().collect());
    }
    raw.iter()
        .map(|slug| {
            Category::from_slug(slug.trim())
                .ok_or_else(|| format!("unknown category \"{}\"", slug.trim()))
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let origin = match Coordinates::new(args.lat, args.lon) {
        Ok(origin) => origin,
        Err(error) => {
            eprintln!("error: {}", error);
            return ExitCode::FAILURE;
        }
    };
    let categories = match parse_categories(&args.categories) {
        Ok(categories) => categories,
        Err(message) => {
            eprintln!("error: {}", message);
            return ExitCode::FAILURE;
        }
    };

    let transport = match ReqwestTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(error) => {
            eprintln!("error: {}", error);
            return ExitCode::FAILURE;
        }
    };
    let search = VenueSearch::new(SearchConfig::from_env(), transport);
    let request = SearchRequest::around(origin, args.radius_km, categories);
    debug!(key = %request.cache_key(), "running search");

    let venues = match search.search(&request).await {
        Ok(venues) => venues,
        Err(error) if error.is_rate_limited() => {
            eprintln!("the map-data service is busy; wait a moment and try again");
            return ExitCode::FAILURE;
        }
        Err(error) => {
            eprintln!("search failed: {}; please retry", error);
            return ExitCode::FAILURE;
        }
    };

    let mut listed: Vec<_> = venues
        .iter()
        .filter(|venue| !args.open_only || venue.open)
        .collect();
    if listed.is_empty() {
        println!("no venues found; try widening the search radius");
        return ExitCode::SUCCESS;
    }
    listed.sort_by(|a, b| {
        let da = origin.distance_m(&a.position);
        let db = origin.distance_m(&b.position);
        da.total_cmp(&db)
    });

    for venue in listed {
        let distance = origin.distance_m(&venue.position);
        let bearing = origin.bearing_to(&venue.position);
        println!(
            "{:>6.0} m  {:>5.1}°  [{}]  {}",
            distance,
            bearing,
            venue.category,
            venue.name
        );
    }

    ExitCode::SUCCESS
}
