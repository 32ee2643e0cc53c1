//! Metadata precompute, filtering, ranking and pagination.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/21/2026 - Facet metadata over the unfiltered set (Claude)
//! 07/20/2026 - Initial implementation (Claude)

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::engine::composer::Itinerary;
use crate::engine::pools::PricingIndex;
use crate::models::flight::{Cabin, CabinValues, Flight};
use crate::models::request::{FilterParams, SortBy, SortOrder};
use crate::models::response::{FilterMetadata, OptimizedItinerary};
use crate::reliability::ReliabilityTable;

/// Share of flight time (layovers excluded) covered by flights with positive
/// seats in `cabin` that are also reliable for it.
///
/// A flight counts as zero for the cabin when it dominates the itinerary
/// (duration above the (100 − threshold)% allowance) while sitting below the
/// carrier minimum, unless the carrier exempts the cabin.
pub fn class_duration_percent(
    flights: &[&Flight],
    cabin: Cabin,
    table: &ReliabilityTable,
    threshold: u8,
) -> f64 {
    let total: u64 = flights.iter().map(|f| f.duration_minutes as u64).sum();
    if total == 0 {
        return 0.0;
    }
    let allowance = (100 - threshold.min(100) as u64) * total;

    let covered: u64 = flights
        .iter()
        .filter(|f| *f.seats.get(cabin) > 0)
        .filter(|f| {
            let dominant = f.duration_minutes as u64 * 100 > allowance;
            if !dominant {
                return true;
            }
            match table.get(&f.carrier()) {
                None => true,
                Some(rule) => {
                    *f.seats.get(cabin) >= rule.min_count
                        || rule.exemptions.to_uppercase().contains(cabin.as_char())
                }
            }
        })
        .map(|f| f.duration_minutes as u64)
        .sum();

    covered as f64 * 100.0 / total as f64
}

fn layover_minutes(prev: &Flight, next: &Flight) -> u32 {
    let gap_ms = next.departs_ms() - prev.arrives_ms();
    if gap_ms <= 0 {
        return 0;
    }
    ((gap_ms as f64) / 60_000.0).round() as u32
}

/// Annotate surviving itineraries with every sort and filter key, once.
pub fn precompute_metadata(
    itineraries: &[Itinerary],
    flight_map: &HashMap<String, Flight>,
    pricing: &PricingIndex,
    table: &ReliabilityTable,
    threshold: u8,
) -> Vec<OptimizedItinerary> {
    let mut out = Vec::with_capacity(itineraries.len());

    for itin in itineraries {
        let flights: Vec<&Flight> = itin.uuids.iter().filter_map(|u| flight_map.get(u)).collect();
        if flights.len() != itin.uuids.len() || flights.is_empty() {
            tracing::warn!("Itinerary references pruned flights; skipping");
            continue;
        }

        let flight_minutes: u32 = flights.iter().map(|f| f.duration_minutes).sum();
        let layovers: u32 = flights.windows(2).map(|w| layover_minutes(w[0], w[1])).sum();

        let mut airline_codes = Vec::new();
        for f in &flights {
            let carrier = f.carrier();
            if !airline_codes.contains(&carrier) {
                airline_codes.push(carrier);
            }
        }

        let waypoints: Vec<String> = itin.route_key.split('-').map(|s| s.to_string()).collect();
        let origin = waypoints.first().cloned().unwrap_or_default();
        let destination = waypoints.last().cloned().unwrap_or_default();
        let connections: Vec<String> = if waypoints.len() > 2 {
            waypoints[1..waypoints.len() - 1].to_vec()
        } else {
            Vec::new()
        };

        let y = if flights.iter().all(|f| f.seats.y > 0) {
            100.0
        } else {
            0.0
        };
        let class_percentages = CabinValues {
            y,
            w: class_duration_percent(&flights, Cabin::W, table, threshold),
            j: class_duration_percent(&flights, Cabin::J, table, threshold),
            f: class_duration_percent(&flights, Cabin::F, table, threshold),
        };

        let mut pricing_ids = Vec::new();
        for f in &flights {
            for id in pricing.lookup(&f.flight_number, &f.origin, &f.destination, &f.source) {
                if !pricing_ids.contains(id) {
                    pricing_ids.push(id.clone());
                }
            }
        }

        out.push(OptimizedItinerary {
            uuids: itin.uuids.clone(),
            route_key: itin.route_key.clone(),
            date: itin.date,
            total_duration: flight_minutes + layovers,
            departure_time: flights[0].departs_ms(),
            arrival_time: flights[flights.len() - 1].arrives_ms(),
            stop_count: connections.len() as u32,
            airline_codes,
            origin,
            destination,
            connections,
            class_percentages,
            pricing_ids,
        });
    }

    out
}

/// Facet ranges for client filter UIs, over the unfiltered set.
pub fn facet_metadata(itineraries: &[OptimizedItinerary]) -> FilterMetadata {
    let mut stops = BTreeSet::new();
    let mut airlines = BTreeSet::new();
    let mut airports = BTreeSet::new();
    let mut meta = FilterMetadata::default();

    for itin in itineraries {
        stops.insert(itin.stop_count);
        airlines.extend(itin.airline_codes.iter().cloned());
        airports.extend(itin.route_key.split('-').map(|s| s.to_string()));

        meta.duration_min = Some(meta.duration_min.map_or(itin.total_duration, |v| v.min(itin.total_duration)));
        meta.duration_max = Some(meta.duration_max.map_or(itin.total_duration, |v| v.max(itin.total_duration)));
        meta.departure_min = Some(meta.departure_min.map_or(itin.departure_time, |v| v.min(itin.departure_time)));
        meta.departure_max = Some(meta.departure_max.map_or(itin.departure_time, |v| v.max(itin.departure_time)));
        meta.arrival_min = Some(meta.arrival_min.map_or(itin.arrival_time, |v| v.min(itin.arrival_time)));
        meta.arrival_max = Some(meta.arrival_max.map_or(itin.arrival_time, |v| v.max(itin.arrival_time)));
    }

    meta.stops = stops.into_iter().collect();
    meta.airlines = airlines.into_iter().collect();
    meta.airports = airports.into_iter().collect();
    meta
}

fn matches_filters(
    itin: &OptimizedItinerary,
    params: &FilterParams,
    flight_map: &HashMap<String, Flight>,
) -> bool {
    if let Some(stops) = &params.stops {
        if !stops.contains(&itin.stop_count) {
            return false;
        }
    }
    if let Some(include) = &params.include_airlines {
        if !itin.airline_codes.iter().all(|c| include.contains(c)) {
            return false;
        }
    }
    if let Some(exclude) = &params.exclude_airlines {
        if itin.airline_codes.iter().any(|c| exclude.contains(c)) {
            return false;
        }
    }
    if let Some(max) = params.max_duration {
        if itin.total_duration > max {
            return false;
        }
    }
    for (min, cabin) in [
        (params.min_y_percent, Cabin::Y),
        (params.min_w_percent, Cabin::W),
        (params.min_j_percent, Cabin::J),
        (params.min_f_percent, Cabin::F),
    ] {
        if let Some(min) = min {
            if *itin.class_percentages.get(cabin) < min as f64 {
                return false;
            }
        }
    }
    if let Some(min) = params.dep_time_min {
        if itin.departure_time < min {
            return false;
        }
    }
    if let Some(max) = params.dep_time_max {
        if itin.departure_time > max {
            return false;
        }
    }
    if let Some(min) = params.arr_time_min {
        if itin.arrival_time < min {
            return false;
        }
    }
    if let Some(max) = params.arr_time_max {
        if itin.arrival_time > max {
            return false;
        }
    }
    if let Some(include) = &params.include_origin {
        if !include.contains(&itin.origin) {
            return false;
        }
    }
    if let Some(include) = &params.include_destination {
        if !include.contains(&itin.destination) {
            return false;
        }
    }
    if let Some(include) = &params.include_connection {
        if !itin.connections.iter().any(|c| include.contains(c)) {
            return false;
        }
    }
    if let Some(exclude) = &params.exclude_origin {
        if exclude.contains(&itin.origin) {
            return false;
        }
    }
    if let Some(exclude) = &params.exclude_destination {
        if exclude.contains(&itin.destination) {
            return false;
        }
    }
    if let Some(exclude) = &params.exclude_connection {
        if itin.connections.iter().any(|c| exclude.contains(c)) {
            return false;
        }
    }
    if let Some(search) = &params.search {
        let needle = search.to_uppercase();
        let in_route = itin.route_key.to_uppercase().contains(&needle);
        let in_airlines = itin.airline_codes.iter().any(|c| c.contains(&needle));
        let in_numbers = itin
            .uuids
            .iter()
            .filter_map(|u| flight_map.get(u))
            .any(|f| f.flight_number.to_uppercase().contains(&needle));
        if !(in_route || in_airlines || in_numbers) {
            return false;
        }
    }
    true
}

/// Natural comparison for a sort key: duration and departure rank smaller
/// values first; arrival and cabin percentages rank larger values first.
fn natural_cmp(a: &OptimizedItinerary, b: &OptimizedItinerary, key: SortBy) -> Ordering {
    match key {
        SortBy::Duration => a.total_duration.cmp(&b.total_duration),
        SortBy::Departure => a.departure_time.cmp(&b.departure_time),
        SortBy::Arrival => b.arrival_time.cmp(&a.arrival_time),
        SortBy::Y => cmp_f64(*b.class_percentages.get(Cabin::Y), *a.class_percentages.get(Cabin::Y)),
        SortBy::W => cmp_f64(*b.class_percentages.get(Cabin::W), *a.class_percentages.get(Cabin::W)),
        SortBy::J => cmp_f64(*b.class_percentages.get(Cabin::J), *a.class_percentages.get(Cabin::J)),
        SortBy::F => cmp_f64(*b.class_percentages.get(Cabin::F), *a.class_percentages.get(Cabin::F)),
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Filter, sort and paginate in one pass over the precomputed set.
/// Returns the page plus the total filtered count.
pub fn filter_sort_paginate(
    itineraries: &[OptimizedItinerary],
    params: &FilterParams,
    flight_map: &HashMap<String, Flight>,
) -> (Vec<OptimizedItinerary>, usize) {
    let mut filtered: Vec<OptimizedItinerary> = itineraries
        .iter()
        .filter(|itin| matches_filters(itin, params, flight_map))
        .cloned()
        .collect();

    filtered.sort_by(|a, b| {
        let primary = match params.sort_order {
            SortOrder::Asc => natural_cmp(a, b, params.sort_by),
            SortOrder::Desc => natural_cmp(b, a, params.sort_by),
        };
        // Tie-break is always totalDuration ascending, whatever the order.
        primary.then_with(|| a.total_duration.cmp(&b.total_duration))
    });

    let total = filtered.len();
    let page_size = params.effective_page_size() as usize;
    let offset = (params.page.saturating_sub(1)) as usize * page_size;
    let page: Vec<OptimizedItinerary> =
        filtered.into_iter().skip(offset).take(page_size).collect();

    (page, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::flight::test_fixtures::flight;
    use crate::reliability::{index_rules, ReliabilityRule};
    use chrono::NaiveDate;

    fn rule(carrier: &str, min_count: u32, exemptions: &str) -> ReliabilityRule {
        ReliabilityRule {
            carrier: carrier.into(),
            min_count,
            exemptions: exemptions.into(),
            ffp_programs: vec![],
        }
    }

    fn make_itin(uuids: Vec<String>, route_key: &str) -> Itinerary {
        Itinerary {
            uuids,
            route_key: route_key.into(),
            date: NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
        }
    }

    fn two_leg_setup() -> (Vec<Itinerary>, HashMap<String, Flight>) {
        let a = flight(
            "VN100",
            "HAN",
            "SGN",
            "2026-02-11T09:00:00+07:00",
            "2026-02-11T11:00:00+07:00",
        );
        let b = flight(
            "QH601",
            "SGN",
            "BKK",
            "2026-02-11T12:00:00+07:00",
            "2026-02-11T13:30:00+07:00",
        );
        let uuids = vec![a.uuid(), b.uuid()];
        let map: HashMap<String, Flight> =
            [(a.uuid(), a), (b.uuid(), b)].into_iter().collect();
        (vec![make_itin(uuids, "HAN-SGN-BKK")], map)
    }

    #[test]
    fn test_precompute_durations_and_codes() {
        let (itins, map) = two_leg_setup();
        let out = precompute_metadata(
            &itins,
            &map,
            &PricingIndex::default(),
            &ReliabilityTable::new(),
            85,
        );

        assert_eq!(out.len(), 1);
        let itin = &out[0];
        // 120 + 90 flight minutes plus a 60-minute layover.
        assert_eq!(itin.total_duration, 270);
        assert_eq!(itin.stop_count, 1);
        assert_eq!(itin.airline_codes, vec!["VN", "QH"]);
        assert_eq!(itin.origin, "HAN");
        assert_eq!(itin.destination, "BKK");
        assert_eq!(itin.connections, vec!["SGN"]);
        assert_eq!(*itin.class_percentages.get(Cabin::Y), 100.0);
    }

    #[test]
    fn test_y_percent_is_all_or_nothing() {
        let (itins, mut map) = two_leg_setup();
        let uuid = itins[0].uuids[1].clone();
        map.get_mut(&uuid).unwrap().seats.y = 0;

        let out = precompute_metadata(
            &itins,
            &map,
            &PricingIndex::default(),
            &ReliabilityTable::new(),
            85,
        );
        assert_eq!(*out[0].class_percentages.get(Cabin::Y), 0.0);
    }

    #[test]
    fn test_class_percent_counts_positive_seats() {
        let mut long = flight(
            "VN100",
            "HAN",
            "SGN",
            "2026-02-11T06:00:00+07:00",
            "2026-02-11T11:00:00+07:00",
        );
        long.seats.j = 2;
        let mut short = flight(
            "QH601",
            "SGN",
            "BKK",
            "2026-02-11T12:00:00+07:00",
            "2026-02-11T13:00:00+07:00",
        );
        short.seats.j = 0;
        long.duration_minutes = 300;
        short.duration_minutes = 100;

        let pct = class_duration_percent(&[&long, &short], Cabin::J, &ReliabilityTable::new(), 85);
        assert!((pct - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_class_percent_reliability_penalty() {
        // The long leg has one J seat but the carrier requires two; since it
        // dominates the itinerary it counts as zero. The W cabin is exempt,
        // so the same seat count survives there.
        let mut long = flight(
            "VN100",
            "HAN",
            "SGN",
            "2026-02-11T06:00:00+07:00",
            "2026-02-11T11:00:00+07:00",
        );
        long.duration_minutes = 900;
        long.seats.j = 1;
        long.seats.w = 1;
        let mut short = flight(
            "QH601",
            "SGN",
            "BKK",
            "2026-02-11T12:00:00+07:00",
            "2026-02-11T13:00:00+07:00",
        );
        short.duration_minutes = 100;
        short.seats.j = 4;
        short.seats.w = 4;

        let table = index_rules(vec![rule("VN", 2, "W")]);
        let j = class_duration_percent(&[&long, &short], Cabin::J, &table, 85);
        let w = class_duration_percent(&[&long, &short], Cabin::W, &table, 85);
        assert!((j - 10.0).abs() < 1e-9);
        assert!((w - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_unreliable_flight_still_counts() {
        // Below the (100 − threshold)% allowance the minimum never applies.
        let mut long = flight(
            "QH100",
            "HAN",
            "SGN",
            "2026-02-11T06:00:00+07:00",
            "2026-02-11T11:00:00+07:00",
        );
        long.duration_minutes = 900;
        long.seats.j = 9;
        let mut short = flight(
            "VN601",
            "SGN",
            "BKK",
            "2026-02-11T12:00:00+07:00",
            "2026-02-11T13:00:00+07:00",
        );
        short.duration_minutes = 100;
        short.seats.j = 1;

        let table = index_rules(vec![rule("VN", 2, "")]);
        let j = class_duration_percent(&[&long, &short], Cabin::J, &table, 85);
        assert!((j - 100.0).abs() < 1e-9);
    }

    fn optimized(route: &str, duration: u32, dep: i64, arr: i64, j: f64) -> OptimizedItinerary {
        OptimizedItinerary {
            uuids: vec![],
            route_key: route.into(),
            date: NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
            total_duration: duration,
            departure_time: dep,
            arrival_time: arr,
            stop_count: route.matches('-').count() as u32 - 1,
            airline_codes: vec!["VN".into()],
            origin: route.split('-').next().unwrap().into(),
            destination: route.split('-').last().unwrap().into(),
            connections: {
                let parts: Vec<&str> = route.split('-').collect();
                parts[1..parts.len() - 1].iter().map(|s| s.to_string()).collect()
            },
            class_percentages: CabinValues { y: 100.0, w: 0.0, j, f: 0.0 },
            pricing_ids: vec![],
        }
    }

    #[test]
    fn test_sort_duration_asc_with_tiebreak() {
        let set = vec![
            optimized("A-B", 300, 2000, 5000, 10.0),
            optimized("A-C-B", 200, 1000, 4000, 90.0),
            optimized("A-D-B", 200, 3000, 6000, 50.0),
        ];
        let params = FilterParams::default();
        let (page, total) = filter_sort_paginate(&set, &params, &HashMap::new());
        assert_eq!(total, 3);
        assert_eq!(page[0].total_duration, 200);
        assert_eq!(page[2].total_duration, 300);
    }

    #[test]
    fn test_sort_j_descending_is_natural() {
        let set = vec![
            optimized("A-B", 300, 2000, 5000, 10.0),
            optimized("A-C-B", 200, 1000, 4000, 90.0),
        ];
        let mut params = FilterParams::default();
        params.sort_by = SortBy::J;
        let (page, _) = filter_sort_paginate(&set, &params, &HashMap::new());
        assert_eq!(*page[0].class_percentages.get(Cabin::J), 90.0);

        params.sort_order = SortOrder::Desc;
        let (page, _) = filter_sort_paginate(&set, &params, &HashMap::new());
        assert_eq!(*page[0].class_percentages.get(Cabin::J), 10.0);
    }

    #[test]
    fn test_filters_apply() {
        let set = vec![
            optimized("A-B", 300, 2000, 5000, 10.0),
            optimized("A-C-B", 200, 1000, 4000, 90.0),
        ];
        let mut params = FilterParams::default();
        params.stops = Some(vec![0]);
        let (page, total) = filter_sort_paginate(&set, &params, &HashMap::new());
        assert_eq!(total, 1);
        assert_eq!(page[0].route_key, "A-B");

        let mut params = FilterParams::default();
        params.min_j_percent = Some(50);
        let (_, total) = filter_sort_paginate(&set, &params, &HashMap::new());
        assert_eq!(total, 1);

        let mut params = FilterParams::default();
        params.exclude_connection = Some(vec!["C".into()]);
        let (page, _) = filter_sort_paginate(&set, &params, &HashMap::new());
        assert_eq!(page[0].route_key, "A-B");
    }

    #[test]
    fn test_pagination_concatenates_to_full_set() {
        let set: Vec<OptimizedItinerary> = (0..25)
            .map(|i| optimized("A-B", 100 + i, i as i64, 1000 + i as i64, 0.0))
            .collect();
        let mut params = FilterParams::default();
        params.page_size = Some(10);

        let mut collected = Vec::new();
        for page_no in 1..=3 {
            params.page = page_no;
            let (page, total) = filter_sort_paginate(&set, &params, &HashMap::new());
            assert_eq!(total, 25);
            collected.extend(page);
        }

        let mut unpaged = FilterParams::default();
        unpaged.page_size = Some(100);
        let (all, _) = filter_sort_paginate(&set, &unpaged, &HashMap::new());
        assert_eq!(
            collected.iter().map(|i| i.total_duration).collect::<Vec<_>>(),
            all.iter().map(|i| i.total_duration).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_facets_cover_unfiltered_set() {
        let set = vec![
            optimized("A-B", 300, 2000, 5000, 10.0),
            optimized("A-C-B", 200, 1000, 4000, 90.0),
        ];
        let meta = facet_metadata(&set);
        assert_eq!(meta.stops, vec![0, 1]);
        assert_eq!(meta.airports, vec!["A", "B", "C"]);
        assert_eq!(meta.duration_min, Some(200));
        assert_eq!(meta.duration_max, Some(300));
        assert_eq!(meta.departure_min, Some(1000));
        assert_eq!(meta.arrival_max, Some(5000));
    }
}
