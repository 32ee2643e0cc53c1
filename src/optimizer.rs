//! Route-group consolidation before the availability fan-out.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/22/2026 - Initial implementation (Claude)

use std::collections::{BTreeMap, BTreeSet};

use crate::models::route::RouteGroup;

/// Consolidate many candidate route groups into fewer provider calls.
///
/// The (origin, destination) pairs of the input form a bipartite graph. Each
/// origin's destinations become one star, and stars are split into bins so a
/// single call stays under `target_offers` (estimating `offers_per_pair`
/// offers per concrete pair). The output is equivalence-preserving: every
/// input pair appears in some output group's origins × destinations product.
pub fn optimize_route_groups(
    groups: &[RouteGroup],
    offers_per_pair: usize,
    target_offers: usize,
) -> Vec<RouteGroup> {
    // BTree containers keep the output deterministic across runs.
    let mut stars: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for group in groups {
        for (origin, destination) in group.pairs() {
            stars.entry(origin).or_default().insert(destination);
        }
    }

    let per_pair = offers_per_pair.max(1);
    let max_pairs_per_call = (target_offers / per_pair).max(1);

    let mut out = Vec::new();
    for (origin, destinations) in stars {
        let destinations: Vec<String> = destinations.into_iter().collect();
        for chunk in destinations.chunks(max_pairs_per_call) {
            out.push(RouteGroup {
                origins: vec![origin.clone()],
                destinations: chunk.to_vec(),
            });
        }
    }
    out
}
