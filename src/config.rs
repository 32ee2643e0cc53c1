//! Engine configuration with environment overrides.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/18/2026 - Initial implementation (Claude)

use std::time::Duration;

/// Tunables for the itinerary engine.
///
/// `Default` carries production values; `from_env` applies overrides from the
/// process environment so deployments can tune without a rebuild.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the route-topology collaborator.
    pub route_topology_url: String,
    /// Base URL of the availability provider.
    pub availability_url: String,
    /// Concurrent availability subqueries per request.
    pub availability_concurrency: usize,
    /// TTL for raw, filtered and availability cache records.
    pub cache_ttl: Duration,
    /// TTL for the process-wide reliability table.
    pub reliability_ttl: Duration,
    /// Default reliability threshold when the request omits one.
    pub default_reliability_percent: u8,
    /// Routes above this count are composed in parallel.
    pub parallel_route_threshold: usize,
    /// Target offer count per consolidated availability call.
    pub optimizer_target_offers: usize,
    /// Estimated offers per (origin, destination) pair, for bin packing.
    pub optimizer_offers_per_pair: usize,
    /// Consolidate route groups before fetching.
    pub optimize_route_groups: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            route_topology_url: "http://localhost:4000".into(),
            availability_url: "http://localhost:4001".into(),
            availability_concurrency: 12,
            cache_ttl: Duration::from_secs(30 * 60),
            reliability_ttl: Duration::from_secs(5 * 60),
            default_reliability_percent: 85,
            parallel_route_threshold: 8,
            optimizer_target_offers: 1000,
            optimizer_offers_per_pair: 40,
            optimize_route_groups: false,
        }
    }
}

impl EngineConfig {
    /// Build a config from defaults plus `AWARD_ROUTES_*` env overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var("AWARD_ROUTES_TOPOLOGY_URL") {
            cfg.route_topology_url = url;
        }
        if let Ok(url) = std::env::var("AWARD_ROUTES_AVAILABILITY_URL") {
            cfg.availability_url = url;
        }
        if let Some(n) = env_usize("AWARD_ROUTES_CONCURRENCY") {
            cfg.availability_concurrency = n.max(1);
        }
        if let Some(secs) = env_usize("AWARD_ROUTES_CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs as u64);
        }
        if let Some(n) = env_usize("AWARD_ROUTES_PARALLEL_ROUTE_THRESHOLD") {
            cfg.parallel_route_threshold = n;
        }
        if let Ok(v) = std::env::var("AWARD_ROUTES_OPTIMIZE_GROUPS") {
            cfg.optimize_route_groups = v == "1" || v.eq_ignore_ascii_case("true");
        }
        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
