//! Carrier reliability rules: table cache, predicates, itinerary filter.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/21/2026 - Single-flight refresh for the table cache (Claude)
//! 07/18/2026 - Initial implementation (Claude)

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::models::flight::{Cabin, Flight};

/// Per-carrier reliability rule from the operator's relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityRule {
    /// Two-character carrier prefix, e.g. "VN".
    pub carrier: String,
    /// Seat count below which a cabin is considered unreliable.
    pub min_count: u32,
    /// Cabins exempt from the minimum, as a subset of "YWJF".
    #[serde(default)]
    pub exemptions: String,
    /// Frequent-flyer programs the rule applies to.
    #[serde(default)]
    pub ffp_programs: Vec<String>,
}

/// Rules indexed by carrier prefix for O(1) lookup.
pub type ReliabilityTable = HashMap<String, ReliabilityRule>;

pub fn index_rules(rules: Vec<ReliabilityRule>) -> ReliabilityTable {
    rules
        .into_iter()
        .map(|r| (r.carrier.to_uppercase(), r))
        .collect()
}

/// Source of reliability rules (relational-store collaborator).
#[async_trait]
pub trait ReliabilitySource: Send + Sync {
    async fn fetch_rules(&self) -> Result<Vec<ReliabilityRule>>;
}

type FetchFuture = Shared<BoxFuture<'static, Result<Arc<ReliabilityTable>, String>>>;

struct CacheState {
    cached: Option<(Instant, Arc<ReliabilityTable>)>,
    inflight: Option<FetchFuture>,
}

/// Process-wide TTL cache with single-flight refresh: the first caller
/// fetches, concurrent callers await the same future, and callers within the
/// TTL get the cached table. A failed refresh serves the stale table when one
/// exists, otherwise an empty table (every flight treated as reliable).
pub struct ReliabilityCache {
    source: Arc<dyn ReliabilitySource>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl ReliabilityCache {
    pub fn new(source: Arc<dyn ReliabilitySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Mutex::new(CacheState {
                cached: None,
                inflight: None,
            }),
        }
    }

    pub async fn table(&self) -> Arc<ReliabilityTable> {
        let fut = {
            let mut state = self.state.lock().await;

            if let Some((fetched_at, table)) = &state.cached {
                if fetched_at.elapsed() < self.ttl {
                    return table.clone();
                }
            }

            match &state.inflight {
                Some(fut) => fut.clone(),
                None => {
                    let source = self.source.clone();
                    let fut = async move {
                        source
                            .fetch_rules()
                            .await
                            .map(|rules| Arc::new(index_rules(rules)))
                            .map_err(|e| e.to_string())
                    }
                    .boxed()
                    .shared();
                    state.inflight = Some(fut.clone());
                    fut
                }
            }
        };

        let result = fut.await;

        let mut state = self.state.lock().await;
        state.inflight = None;
        match result {
            Ok(table) => {
                state.cached = Some((Instant::now(), table.clone()));
                table
            }
            Err(e) => {
                tracing::warn!("Reliability table refresh failed: {}", e);
                match &state.cached {
                    Some((_, stale)) => stale.clone(),
                    None => Arc::new(ReliabilityTable::new()),
                }
            }
        }
    }
}

fn cabin_exempt(rule: &ReliabilityRule, cabin: Cabin) -> bool {
    rule.exemptions.to_uppercase().contains(cabin.as_char())
}

/// A flight is unreliable for a cabin when its seat count is below the
/// carrier minimum and the cabin is not exempt. Carriers without a rule are
/// always reliable.
pub fn unreliable_for_cabin(flight: &Flight, cabin: Cabin, table: &ReliabilityTable) -> bool {
    match table.get(&flight.carrier()) {
        None => false,
        Some(rule) => *flight.seats.get(cabin) < rule.min_count && !cabin_exempt(rule, cabin),
    }
}

pub fn unreliable_for_all_cabins(flight: &Flight, table: &ReliabilityTable) -> bool {
    Cabin::ALL
        .iter()
        .all(|&cabin| unreliable_for_cabin(flight, cabin, table))
}

/// Minutes of flight time contributed by fully-unreliable flights.
pub fn unreliable_flight_minutes(flights: &[&Flight], table: &ReliabilityTable) -> u64 {
    flights
        .iter()
        .filter(|f| unreliable_for_all_cabins(f, table))
        .map(|f| f.duration_minutes as u64)
        .sum()
}

/// Accept an itinerary iff its fully-unreliable share of flight time (layovers
/// excluded) stays within (100 − threshold)% of total flight time.
pub fn passes_reliability(flights: &[&Flight], table: &ReliabilityTable, threshold: u8) -> bool {
    let total: u64 = flights.iter().map(|f| f.duration_minutes as u64).sum();
    if total == 0 {
        return true;
    }
    let unreliable = unreliable_flight_minutes(flights, table);
    unreliable * 100 <= (100 - threshold.min(100) as u64) * total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::flight::test_fixtures::flight;
    use crate::models::flight::CabinValues;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rule(carrier: &str, min_count: u32, exemptions: &str) -> ReliabilityRule {
        ReliabilityRule {
            carrier: carrier.into(),
            min_count,
            exemptions: exemptions.into(),
            ffp_programs: vec![],
        }
    }

    fn five_hour_flight(number: &str, seats: CabinValues<u32>) -> Flight {
        let mut f = flight(
            number,
            "SGN",
            "HAN",
            "2026-02-11T06:00:00+07:00",
            "2026-02-11T11:00:00+07:00",
        );
        f.seats = seats;
        f
    }

    #[test]
    fn test_no_rule_means_reliable() {
        let table = ReliabilityTable::new();
        let f = five_hour_flight("VN1", CabinValues::default());
        assert!(!unreliable_for_all_cabins(&f, &table));
    }

    #[test]
    fn test_exemption_waives_minimum() {
        let table = index_rules(vec![rule("VN", 2, "Y")]);
        let f = five_hour_flight("VN1", CabinValues { y: 0, w: 0, j: 0, f: 0 });
        assert!(!unreliable_for_cabin(&f, Cabin::Y, &table));
        assert!(unreliable_for_cabin(&f, Cabin::J, &table));
        assert!(!unreliable_for_all_cabins(&f, &table));
    }

    #[test]
    fn test_reliability_eviction_scenario() {
        // Two 300-minute flights; the second has every cabin at zero.
        // Unreliable share is 50%, above the 15% allowance at threshold 85.
        let table = index_rules(vec![rule("VN", 1, "")]);
        let good = five_hour_flight("VN1", CabinValues { y: 9, w: 0, j: 0, f: 0 });
        let bad = five_hour_flight("VN2", CabinValues { y: 0, w: 0, j: 0, f: 0 });
        assert!(!passes_reliability(&[&good, &bad], &table, 85));

        // With Y seats on the second flight the itinerary is accepted.
        let fixed = five_hour_flight("VN2", CabinValues { y: 1, w: 0, j: 0, f: 0 });
        assert!(passes_reliability(&[&good, &fixed], &table, 85));
    }

    #[test]
    fn test_threshold_boundary() {
        // 100-minute unreliable leg out of 1000 total = exactly 10%, allowed
        // at threshold 90.
        let table = index_rules(vec![rule("XX", 1, "")]);
        let mut long = five_hour_flight("VN1", CabinValues { y: 9, w: 0, j: 0, f: 0 });
        long.duration_minutes = 900;
        let mut short = five_hour_flight("XX9", CabinValues::default());
        short.duration_minutes = 100;
        assert!(passes_reliability(&[&long, &short], &table, 90));
        assert!(!passes_reliability(&[&long, &short], &table, 91));
    }

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ReliabilitySource for CountingSource {
        async fn fetch_rules(&self) -> Result<Vec<ReliabilityRule>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                anyhow::bail!("db down");
            }
            Ok(vec![rule("VN", 2, "Y")])
        }
    }

    #[tokio::test]
    async fn test_single_flight_refresh() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = Arc::new(ReliabilityCache::new(source.clone(), Duration::from_secs(300)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.table().await }));
        }
        for handle in handles {
            let table = handle.await.unwrap();
            assert!(table.contains_key("VN"));
        }
        // All eight callers shared one fetch.
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // Within the TTL no further fetch happens.
        cache.table().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_yields_empty_table() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cache = ReliabilityCache::new(source, Duration::from_secs(300));
        let table = cache.table().await;
        assert!(table.is_empty());
    }
}
