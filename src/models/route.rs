//! Route structures, city groups and route-key derivation.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/19/2026 - City-aware route-key derivation (Claude)
//! 07/18/2026 - Initial implementation (Claude)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::flight::Flight;

/// City-to-airports reference data embedded at compile time.
const CITY_GROUPS_JSON: &str = include_str!("../../data/city_groups.json");

static CITY_GROUPS: Lazy<CityGroups> =
    Lazy::new(|| CityGroups::load().expect("Failed to load embedded city group data"));

/// Read-only city/airport lookup, loaded once per process.
pub struct CityGroups {
    by_city: HashMap<String, Vec<String>>,
    city_of: HashMap<String, String>,
}

impl CityGroups {
    fn load() -> Result<Self, serde_json::Error> {
        let by_city: HashMap<String, Vec<String>> = serde_json::from_str(CITY_GROUPS_JSON)?;

        let mut city_of = HashMap::new();
        for (city, airports) in &by_city {
            for airport in airports {
                city_of.insert(airport.clone(), city.clone());
            }
        }

        tracing::info!("Loaded {} city groups", by_city.len());

        Ok(Self { by_city, city_of })
    }

    pub fn instance() -> &'static Self {
        &CITY_GROUPS
    }

    /// Expand a waypoint code into concrete airports. Airport codes expand to
    /// themselves.
    pub fn expand(&self, code: &str) -> Vec<String> {
        match self.by_city.get(code) {
            Some(airports) => airports.clone(),
            None => vec![code.to_string()],
        }
    }

    /// The city a given airport belongs to, if it is part of a group.
    pub fn city_of(&self, airport: &str) -> Option<&str> {
        self.city_of.get(airport).map(|s| s.as_str())
    }

    pub fn is_city(&self, code: &str) -> bool {
        self.by_city.contains_key(code)
    }
}

/// A candidate waypoint chain O → A → h1? → h2? → B → D with per-leg alliance
/// whitelists. `None` means any alliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePath {
    pub waypoints: Vec<String>,
    #[serde(default)]
    pub all1: Option<HashSet<String>>,
    #[serde(default)]
    pub all2: Option<HashSet<String>>,
    #[serde(default)]
    pub all3: Option<HashSet<String>>,
}

impl RoutePath {
    pub fn key(&self) -> String {
        self.waypoints.join("-")
    }

    /// Alliance whitelist for segment `idx` of `total`: first leg `all1`,
    /// last leg `all3`, intermediates `all2`. A direct route's only segment
    /// takes `all1`.
    pub fn alliance_for_segment(&self, idx: usize, total: usize) -> Option<&HashSet<String>> {
        if idx == 0 {
            self.all1.as_ref()
        } else if idx + 1 == total {
            self.all3.as_ref()
        } else {
            self.all2.as_ref()
        }
    }
}

/// A compact availability subquery: `ORIG1/ORIG2-DEST1/DEST2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGroup {
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
}

impl RouteGroup {
    /// Parse the provider's compact form. Returns None when either side is
    /// empty.
    pub fn parse(route_id: &str) -> Option<Self> {
        let (lhs, rhs) = route_id.split_once('-')?;
        let origins: Vec<String> = lhs
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_uppercase())
            .collect();
        let destinations: Vec<String> = rhs
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_uppercase())
            .collect();
        if origins.is_empty() || destinations.is_empty() {
            return None;
        }
        Some(Self {
            origins,
            destinations,
        })
    }

    pub fn route_id(&self) -> String {
        format!("{}-{}", self.origins.join("/"), self.destinations.join("/"))
    }

    /// Every concrete (origin, destination) pair this group covers.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(self.origins.len() * self.destinations.len());
        for o in &self.origins {
            for d in &self.destinations {
                out.push((o.clone(), d.clone()));
            }
        }
        out
    }
}

/// Re-derive the canonical route key from the flights actually composed.
///
/// Waypoints are airport codes, except when an itinerary changes airports
/// within one city between legs; that connection is collapsed to the city
/// code. Endpoints are always airports.
pub fn derive_route_key(flights: &[&Flight], cities: &CityGroups) -> String {
    let mut waypoints: Vec<String> = Vec::with_capacity(flights.len() + 1);
    if let Some(first) = flights.first() {
        waypoints.push(first.origin.clone());
    }
    for pair in flights.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.destination == next.origin {
            waypoints.push(prev.destination.clone());
        } else {
            match (cities.city_of(&prev.destination), cities.city_of(&next.origin)) {
                (Some(a), Some(b)) if a == b => waypoints.push(a.to_string()),
                _ => {
                    waypoints.push(prev.destination.clone());
                    waypoints.push(next.origin.clone());
                }
            }
        }
    }
    if let Some(last) = flights.last() {
        waypoints.push(last.destination.clone());
    }
    waypoints.join("-")
}
