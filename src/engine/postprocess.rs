//! Post-composition pipeline: dedup, prune, date window, reliability.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/20/2026 - Initial implementation (Claude)

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::engine::composer::Itinerary;
use crate::models::flight::Flight;
use crate::reliability::{passes_reliability, ReliabilityTable};

/// Run the fixed post-processing order over composed itineraries, pruning the
/// flight map down to surviving references.
pub fn post_process(
    itineraries: Vec<Itinerary>,
    flight_map: &mut HashMap<String, Flight>,
    table: &ReliabilityTable,
    threshold: u8,
    start_date: NaiveDate,
    end_date: NaiveDate,
    region: bool,
) -> Vec<Itinerary> {
    let deduped = dedup(itineraries);
    prune_flight_map(&deduped, flight_map);

    let dated: Vec<Itinerary> = deduped
        .into_iter()
        .filter(|itin| in_date_window(itin, flight_map, start_date, end_date))
        .collect();

    // Region requests skip reliability trimming; their paths were validated
    // upstream against subregion data the rules cannot see.
    let surviving: Vec<Itinerary> = if region {
        dated
    } else {
        dated
            .into_iter()
            .filter(|itin| {
                let flights: Vec<&Flight> =
                    itin.uuids.iter().filter_map(|u| flight_map.get(u)).collect();
                passes_reliability(&flights, table, threshold)
            })
            .collect()
    };

    prune_flight_map(&surviving, flight_map);
    surviving
}

/// One itinerary per (route, date, uuid-sequence).
fn dedup(itineraries: Vec<Itinerary>) -> Vec<Itinerary> {
    let mut seen: HashSet<(String, NaiveDate, String)> = HashSet::new();
    itineraries
        .into_iter()
        .filter(|itin| {
            seen.insert((itin.route_key.clone(), itin.date, itin.uuids.join(",")))
        })
        .collect()
}

/// Drop flights no surviving itinerary references.
fn prune_flight_map(itineraries: &[Itinerary], flight_map: &mut HashMap<String, Flight>) {
    let used: HashSet<&String> = itineraries.iter().flat_map(|i| i.uuids.iter()).collect();
    flight_map.retain(|uuid, _| used.contains(uuid));
}

fn in_date_window(
    itin: &Itinerary,
    flight_map: &HashMap<String, Flight>,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> bool {
    let Some(first) = itin.uuids.first().and_then(|u| flight_map.get(u)) else {
        return false;
    };
    let date = first.local_departure_date();
    date >= start_date && date <= end_date
}
