//! Overpass wire protocol and failover client
//!
//! This module speaks to Overpass-compatible map-data services. It builds
//! structured QL queries ([`build_query`]), decodes the JSON response
//! envelope and maps raw elements into venues ([`venues_from_envelope`]),
//! and issues requests through a rate-limited, multi-endpoint failover
//! client ([`OverpassClient`]).
//!
//! The HTTP transport is abstracted behind [`HttpTransport`] so tests inject
//! mock transports instead of touching the network.

mod client;
mod error;
mod ql;
mod wire;

pub use client::{
    HttpResponse, HttpTransport, OverpassClient, ReqwestTransport, DEFAULT_ENDPOINTS,
};
pub use error::QueryError;
pub use ql::{build_query, QueryArea, CITY_FALLBACK_RADIUS_KM};
pub use wire::{venues_from_envelope, Element, Envelope};
