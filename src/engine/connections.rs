//! Connection indexing: timing metadata, group matrix, flight matrix.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/20/2026 - Group-level envelope pruning before flight pairing (Claude)
//! 07/19/2026 - Initial implementation (Claude)

use std::collections::{HashMap, HashSet};

use crate::engine::pools::SegmentPool;
use crate::models::flight::{Flight, Group};

/// Minimum connection gap: 45 minutes.
pub const MIN_CONNECTION_MS: i64 = 45 * 60 * 1000;
/// Maximum connection gap: 24 hours.
pub const MAX_CONNECTION_MS: i64 = 24 * 60 * 60 * 1000;

/// Pre-parsed timing for one flight; the composer and metadata passes never
/// touch chrono again after this.
#[derive(Debug, Clone)]
pub struct FlightTiming {
    pub departs_ms: i64,
    pub arrives_ms: i64,
    pub origin: String,
    pub destination: String,
}

/// Request-scoped connection index.
///
/// The group matrix prunes whole response buckets by timing envelope before
/// any flight pair is inspected; the flight matrix then holds exactly the
/// valid connections, turning composition into set lookups.
#[derive(Debug, Default)]
pub struct ConnectionIndex {
    pub flight_map: HashMap<String, Flight>,
    pub timing: HashMap<String, FlightTiming>,
    pub group_matrix: HashMap<String, HashSet<String>>,
    pub flight_matrix: HashMap<String, HashSet<String>>,
}

impl ConnectionIndex {
    /// Whether `next` is a valid connection after `prev`.
    pub fn connects(&self, prev_uuid: &str, next_uuid: &str) -> bool {
        self.flight_matrix
            .get(prev_uuid)
            .map(|set| set.contains(next_uuid))
            .unwrap_or(false)
    }
}

pub fn valid_gap(gap_ms: i64) -> bool {
    (MIN_CONNECTION_MS..=MAX_CONNECTION_MS).contains(&gap_ms)
}

/// Envelope check: connect unless the timing envelopes rule out every pair.
/// Groups without an envelope fall through conservatively.
fn groups_connect(a: &Group, b: &Group) -> bool {
    let (Some(earliest_arr_a), Some(latest_arr_a)) = (a.earliest_arrival, a.latest_arrival) else {
        return true;
    };
    let (Some(earliest_dep_b), Some(latest_dep_b)) = (b.earliest_departure, b.latest_departure)
    else {
        return true;
    };

    let widest_gap = latest_dep_b.timestamp_millis() - earliest_arr_a.timestamp_millis();
    let narrowest_gap = earliest_dep_b.timestamp_millis() - latest_arr_a.timestamp_millis();
    widest_gap >= MIN_CONNECTION_MS && narrowest_gap <= MAX_CONNECTION_MS
}

/// One pass over the segment pool: flight metadata, then the two matrices.
pub fn build_connection_index(pool: &SegmentPool) -> ConnectionIndex {
    let groups: Vec<&Group> = pool.groups().collect();

    let mut index = ConnectionIndex::default();
    let mut group_uuids: Vec<Vec<String>> = Vec::with_capacity(groups.len());

    let mut by_origin: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, group) in groups.iter().enumerate() {
        by_origin.entry(group.origin.as_str()).or_default().push(i);

        let mut uuids = Vec::with_capacity(group.flights.len());
        for flight in &group.flights {
            let uuid = flight.uuid();
            index.timing.insert(
                uuid.clone(),
                FlightTiming {
                    departs_ms: flight.departs_ms(),
                    arrives_ms: flight.arrives_ms(),
                    origin: flight.origin.clone(),
                    destination: flight.destination.clone(),
                },
            );
            index.flight_map.insert(uuid.clone(), flight.clone());
            uuids.push(uuid);
        }
        group_uuids.push(uuids);
    }

    // Group matrix: only groups departing from A's destination are candidates.
    let mut connected: Vec<Vec<usize>> = vec![Vec::new(); groups.len()];
    for (a_idx, a) in groups.iter().enumerate() {
        let Some(candidates) = by_origin.get(a.destination.as_str()) else {
            continue;
        };
        for &b_idx in candidates {
            if groups_connect(a, groups[b_idx]) {
                connected[a_idx].push(b_idx);
                index
                    .group_matrix
                    .entry(a.key())
                    .or_default()
                    .insert(groups[b_idx].key());
            }
        }
    }

    // Flight matrix: pairwise gaps over the precomputed timing, but only
    // within connected groups.
    for a_idx in 0..groups.len() {
        for f_uuid in &group_uuids[a_idx] {
            let f_arrives = index.timing[f_uuid].arrives_ms;
            for &b_idx in &connected[a_idx] {
                for g_uuid in &group_uuids[b_idx] {
                    if g_uuid == f_uuid {
                        continue;
                    }
                    if valid_gap(index.timing[g_uuid].departs_ms - f_arrives) {
                        index
                            .flight_matrix
                            .entry(f_uuid.clone())
                            .or_default()
                            .insert(g_uuid.clone());
                    }
                }
            }
        }
    }

    tracing::debug!(
        "Connection index: {} flights, {} group edges, {} flight edges",
        index.flight_map.len(),
        index.group_matrix.values().map(|s| s.len()).sum::<usize>(),
        index.flight_matrix.values().map(|s| s.len()).sum::<usize>(),
    );
    index
}
