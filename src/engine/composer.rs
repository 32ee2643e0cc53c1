//! Stack-based itinerary composer.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/20/2026 - Per-date dedup on canonical UUID strings (Claude)
//! 07/19/2026 - Initial implementation (Claude)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::engine::connections::ConnectionIndex;
use crate::engine::pools::SegmentPool;
use crate::engine::prefilter::PlannedRoute;
use crate::models::flight::Group;
use crate::models::route::{derive_route_key, CityGroups};

/// A composed itinerary before metadata annotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Itinerary {
    pub uuids: Vec<String>,
    pub route_key: String,
    pub date: NaiveDate,
}

struct Frame {
    seg_idx: usize,
    path: Vec<String>,
    used_airports: HashSet<String>,
    prev_uuid: String,
    date: NaiveDate,
}

fn group_allowed(group: &Group, allowed: &Option<HashSet<String>>) -> bool {
    match allowed {
        Some(whitelist) => whitelist.contains(&group.alliance),
        None => true,
    }
}

/// Depth-first composition of one planned route.
///
/// An explicit work stack replaces recursion: depth equals segment count, and
/// frame state stays inspectable. Returns UUID sequences bucketed by the
/// local departure date of the first flight, deduplicated per date.
pub fn compose_route(
    planned: &PlannedRoute,
    pool: &SegmentPool,
    index: &ConnectionIndex,
) -> HashMap<NaiveDate, Vec<Vec<String>>> {
    let mut results: HashMap<NaiveDate, Vec<Vec<String>>> = HashMap::new();
    let mut seen: HashMap<NaiveDate, HashSet<String>> = HashMap::new();
    let segment_count = planned.segments.len();
    if segment_count == 0 {
        return results;
    }

    let mut stack: Vec<Frame> = Vec::new();

    // Seed with every first-segment flight, bucketed by departure date.
    for (from, to) in &planned.segments[0].keys {
        let Some(groups) = pool.get(from, to) else {
            continue;
        };
        for group in groups {
            if !group_allowed(group, &planned.segments[0].alliance) {
                continue;
            }
            for flight in &group.flights {
                let uuid = flight.uuid();
                let mut used_airports = HashSet::with_capacity(segment_count + 1);
                used_airports.insert(flight.origin.clone());
                used_airports.insert(flight.destination.clone());
                stack.push(Frame {
                    seg_idx: 1,
                    path: vec![uuid.clone()],
                    used_airports,
                    prev_uuid: uuid,
                    date: flight.local_departure_date(),
                });
            }
        }
    }

    while let Some(frame) = stack.pop() {
        if frame.seg_idx == segment_count {
            let canonical = frame.path.join(",");
            if seen.entry(frame.date).or_default().insert(canonical) {
                results.entry(frame.date).or_default().push(frame.path);
            }
            continue;
        }

        let segment = &planned.segments[frame.seg_idx];
        for (from, to) in &segment.keys {
            // Loop avoidance: never revisit an airport on this path.
            if frame.used_airports.contains(to) {
                continue;
            }
            let Some(groups) = pool.get(from, to) else {
                continue;
            };
            for group in groups {
                // Alliance filter once per group, not per flight.
                if !group_allowed(group, &segment.alliance) {
                    continue;
                }
                for flight in &group.flights {
                    let uuid = flight.uuid();
                    if !index.connects(&frame.prev_uuid, &uuid) {
                        continue;
                    }
                    let mut path = frame.path.clone();
                    path.push(uuid.clone());
                    let mut used_airports = frame.used_airports.clone();
                    used_airports.insert(to.clone());
                    stack.push(Frame {
                        seg_idx: frame.seg_idx + 1,
                        path,
                        used_airports,
                        prev_uuid: uuid,
                        date: frame.date,
                    });
                }
            }
        }
    }

    results
}

/// Compose every planned route and attach re-derived route keys.
pub fn compose_itineraries(
    planned: &[PlannedRoute],
    pool: &SegmentPool,
    index: &ConnectionIndex,
    cities: &CityGroups,
) -> Vec<Itinerary> {
    let mut out = Vec::new();
    for route in planned {
        let by_date = compose_route(route, pool, index);
        for (date, paths) in by_date {
            for uuids in paths {
                let flights: Vec<_> = uuids
                    .iter()
                    .filter_map(|u| index.flight_map.get(u))
                    .collect();
                if flights.len() != uuids.len() {
                    // Every composed UUID came from the flight map; a miss
                    // would be an indexing bug, not recoverable data.
                    tracing::warn!("Composed path references unknown flight; dropping");
                    continue;
                }
                let route_key = derive_route_key(&flights, cities);
                out.push(Itinerary {
                    uuids,
                    route_key,
                    date,
                });
            }
        }
    }
    tracing::debug!("Composed {} itineraries across {} routes", out.len(), planned.len());
    out
}
