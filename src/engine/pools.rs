//! Segment pool and pricing index built from fan-out results.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/19/2026 - Initial implementation (Claude)

use std::collections::HashMap;

use crate::fetcher::SubqueryResult;
use crate::models::flight::{Group, PricingEntry};

/// Offers bucketed by directed (from, to) segment key. Duplicate groups are
/// permitted; the post-composition dedup works per UUID.
#[derive(Debug, Default)]
pub struct SegmentPool {
    segments: HashMap<(String, String), Vec<Group>>,
}

impl SegmentPool {
    pub fn insert(&mut self, group: Group) {
        self.segments
            .entry((group.origin.clone(), group.destination.clone()))
            .or_default()
            .push(group);
    }

    pub fn get(&self, from: &str, to: &str) -> Option<&Vec<Group>> {
        self.segments.get(&(from.to_string(), to.to_string()))
    }

    pub fn contains(&self, from: &str, to: &str) -> bool {
        self.segments
            .contains_key(&(from.to_string(), to.to_string()))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.segments.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Pricing entries keyed by id, with a (flight, origin, destination, source)
/// index for the metadata pass.
#[derive(Debug, Default)]
pub struct PricingIndex {
    pub pool: HashMap<String, PricingEntry>,
    by_flight_and_route: HashMap<(String, String, String, String), Vec<String>>,
}

impl PricingIndex {
    pub fn insert(&mut self, entry: PricingEntry) {
        let id = entry.id();
        self.by_flight_and_route
            .entry(entry.route_key())
            .or_default()
            .push(id.clone());
        self.pool.insert(id, entry);
    }

    /// Pricing ids matching one flight on one segment and feed.
    pub fn lookup(
        &self,
        flight_number: &str,
        origin: &str,
        destination: &str,
        source: &str,
    ) -> &[String] {
        self.by_flight_and_route
            .get(&(
                flight_number.to_string(),
                origin.to_string(),
                destination.to_string(),
                source.to_string(),
            ))
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }
}

/// Walk the fan-out output into the two pools.
pub fn build_pools(results: Vec<SubqueryResult>) -> (SegmentPool, PricingIndex) {
    let mut segments = SegmentPool::default();
    let mut pricing = PricingIndex::default();

    for result in results {
        for group in result.groups {
            segments.insert(group);
        }
        for entry in result.pricing {
            pricing.insert(entry);
        }
    }

    tracing::debug!(
        "Segment pool holds {} segment keys, {} pricing entries",
        segments.len(),
        pricing.pool.len()
    );
    (segments, pricing)
}
