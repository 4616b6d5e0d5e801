//! # IPv4 Geolocation Lookup Service
//!
//! This crate resolves IPv4 addresses to a country (and, when known, region
//! and city) using a range table loaded from a CSV dataset, and serves those
//! lookups over a small JSON HTTP API.
//!
//! ## What this crate does
//!
//! - Parses dotted-quad input strictly, with a distinct reason for every
//!   rejection.
//! - Keeps the whole dataset in memory as a sorted, non-overlapping range
//!   table with logarithmic-time lookups.
//! - Serves `GET /ip/location?ip=<address>` with JSON bodies and
//!   `200`/`400`/`404` status codes.
//! - Swaps in a reloaded dataset atomically while requests are in flight.
//!
//! ## What this crate does NOT do
//!
//! - It does **not** resolve IPv6 addresses.
//! - It does **not** probe hosts or consult any online service at lookup time.
//!
//! ## Design goals
//!
//! - Predictable performance (no syscalls, locks, or I/O on lookup).
//! - Deterministic results for a given dataset.
//! - Read-only sharing of the index between all request handlers.
//!
//! ## Library usage
//!
//! ```
//! use ip_geo_lookup::{GeoRecord, LookupResult, LookupService, OverlapPolicy, RangeIndex};
//!
//! let index = RangeIndex::from_ranges(
//!     [(16_777_216, 16_777_471, GeoRecord::new("United States", "US").with_city("Los Angeles"))],
//!     OverlapPolicy::Reject,
//! )
//! .unwrap();
//! let service = LookupService::new(index);
//!
//! match service.lookup("1.0.0.100") {
//!     LookupResult::Found(record) => assert_eq!(record.country_code, "US"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
mod address;
pub mod config;
mod database;
mod error;
pub mod http;
pub mod loader;
mod service;

// Re-export public API
pub use address::{ParseError, ParseErrorKind, parse_ipv4, parse_ipv4_addr};
pub use database::{GeoRecord, IndexStats, OverlapPolicy, Range, RangeIndex, RangeIndexBuilder};
pub use error::{Error, Result};
pub use service::{LookupResult, LookupService};
