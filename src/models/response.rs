//! Response envelope and cached record types.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/21/2026 - Facet metadata for client filter UIs (Claude)
//! 07/18/2026 - Initial implementation (Claude)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::flight::{CabinValues, Flight, PricingEntry};
use crate::models::route::RoutePath;

/// An itinerary annotated with every precomputed sort and filter key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedItinerary {
    /// Flight UUIDs in travel order.
    pub uuids: Vec<String>,
    /// Canonical route key, e.g. "HAN-SGN-BKK".
    pub route_key: String,
    /// Local calendar date of the first departure.
    pub date: NaiveDate,
    /// Flight time plus layovers, minutes.
    pub total_duration: u32,
    /// Epoch ms of the first departure.
    pub departure_time: i64,
    /// Epoch ms of the last arrival.
    pub arrival_time: i64,
    pub stop_count: u32,
    /// Unique two-character carrier prefixes, upper-cased.
    pub airline_codes: Vec<String>,
    pub origin: String,
    pub destination: String,
    /// Connection waypoints from the route key.
    pub connections: Vec<String>,
    /// Per-cabin coverage percentages (Y is all-or-nothing).
    pub class_percentages: CabinValues<f64>,
    #[serde(default)]
    pub pricing_ids: Vec<String>,
}

/// Facet ranges for client-side filter UIs, derived from the unfiltered set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterMetadata {
    pub stops: Vec<u32>,
    pub airlines: Vec<String>,
    pub airports: Vec<String>,
    pub duration_min: Option<u32>,
    pub duration_max: Option<u32>,
    pub departure_min: Option<i64>,
    pub departure_max: Option<i64>,
    pub arrival_min: Option<i64>,
    pub arrival_max: Option<i64>,
}

/// The exact object returned to the caller (and stored in the filtered cache).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildItinerariesResponse {
    pub itineraries: Vec<OptimizedItinerary>,
    /// Every flight referenced by a returned itinerary, keyed by UUID.
    pub flights: HashMap<String, Flight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<HashMap<String, PricingEntry>>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub min_rate_limit_remaining: Option<i64>,
    pub min_rate_limit_reset: Option<i64>,
    pub total_upstream_http_requests: u32,
    pub filter_metadata: FilterMetadata,
}

/// Pre-filter search state persisted under the raw cache key; re-filtered and
/// re-paginated on every same-core-params request within the TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchRecord {
    pub itineraries: Vec<OptimizedItinerary>,
    pub flights: HashMap<String, Flight>,
    pub pricing: HashMap<String, PricingEntry>,
    pub route_structures: Vec<RoutePath>,
    pub rate_limit_remaining: Option<i64>,
    pub rate_limit_reset: Option<i64>,
    pub upstream_requests: u32,
}

impl OptimizedItinerary {
    /// Layover-free flight time, recomputed from the flight map.
    pub fn flight_duration(&self, flights: &HashMap<String, Flight>) -> u32 {
        self.uuids
            .iter()
            .filter_map(|u| flights.get(u))
            .map(|f| f.duration_minutes)
            .sum()
    }
}
