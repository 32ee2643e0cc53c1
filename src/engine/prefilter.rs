//! Route pre-filtering and segment planning.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/19/2026 - Initial implementation (Claude)

use std::collections::HashSet;

use crate::engine::pools::SegmentPool;
use crate::models::route::{CityGroups, RoutePath};

/// One leg of a planned route: the concrete airport pairs it may use after
/// city expansion, plus its alliance whitelist.
#[derive(Debug, Clone)]
pub struct PlannedSegment {
    pub keys: Vec<(String, String)>,
    pub alliance: Option<HashSet<String>>,
}

/// A candidate route with its waypoints exploded into segment keys.
#[derive(Debug, Clone)]
pub struct PlannedRoute {
    pub route: RoutePath,
    pub segments: Vec<PlannedSegment>,
}

/// Explode waypoint chains into segment keys and drop routes with an
/// offer-less segment. Region-mode waypoints are subregions the upstream
/// enumerator has already validated, so pre-filtering is skipped entirely.
pub fn plan_routes(
    routes: &[RoutePath],
    pool: &SegmentPool,
    cities: &CityGroups,
    region: bool,
) -> Vec<PlannedRoute> {
    let mut planned = Vec::new();

    'routes: for route in routes {
        if route.waypoints.len() < 2 {
            tracing::warn!("Dropping degenerate route: {}", route.key());
            continue;
        }
        let segment_count = route.waypoints.len() - 1;
        let mut segments = Vec::with_capacity(segment_count);

        for (i, pair) in route.waypoints.windows(2).enumerate() {
            let froms = cities.expand(&pair[0]);
            let tos = cities.expand(&pair[1]);

            let mut keys = Vec::with_capacity(froms.len() * tos.len());
            for from in &froms {
                for to in &tos {
                    keys.push((from.clone(), to.clone()));
                }
            }

            if !region && !keys.iter().any(|(from, to)| pool.contains(from, to)) {
                tracing::debug!(
                    "Pre-filter dropped route {} (no offers for {}-{})",
                    route.key(),
                    pair[0],
                    pair[1]
                );
                continue 'routes;
            }

            segments.push(PlannedSegment {
                keys,
                alliance: route.alliance_for_segment(i, segment_count).cloned(),
            });
        }

        planned.push(PlannedRoute {
            route: route.clone(),
            segments,
        });
    }

    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::flight::test_fixtures::{flight, group};

    fn pool_with(legs: &[(&str, &str)]) -> SegmentPool {
        let mut pool = SegmentPool::default();
        for (from, to) in legs {
            pool.insert(group(
                "ST",
                vec![flight(
                    "VN100",
                    from,
                    to,
                    "2026-02-11T06:00:00+07:00",
                    "2026-02-11T08:00:00+07:00",
                )],
            ));
        }
        pool
    }

    fn route(waypoints: &[&str]) -> RoutePath {
        RoutePath {
            waypoints: waypoints.iter().map(|s| s.to_string()).collect(),
            all1: None,
            all2: None,
            all3: None,
        }
    }

    #[test]
    fn test_drops_route_without_offers() {
        let pool = pool_with(&[("SGN", "HAN")]);
        let routes = vec![route(&["SGN", "HAN"]), route(&["SGN", "DAD", "HAN"])];

        let planned = plan_routes(&routes, &pool, CityGroups::instance(), false);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].route.key(), "SGN-HAN");
    }

    #[test]
    fn test_city_waypoint_expands_keys() {
        let pool = pool_with(&[("SGN", "NRT")]);
        let routes = vec![route(&["SGN", "TYO"])];

        let planned = plan_routes(&routes, &pool, CityGroups::instance(), false);
        assert_eq!(planned.len(), 1);
        let keys = &planned[0].segments[0].keys;
        // TYO expands to both airports; one having offers is enough.
        assert!(keys.contains(&("SGN".into(), "NRT".into())));
        assert!(keys.contains(&("SGN".into(), "HND".into())));
    }

    #[test]
    fn test_region_mode_skips_prefilter() {
        let pool = SegmentPool::default();
        let routes = vec![route(&["SEA", "JPN", "VNM"])];

        let planned = plan_routes(&routes, &pool, CityGroups::instance(), true);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].segments.len(), 2);
    }

    #[test]
    fn test_alliance_assignment_per_leg() {
        let pool = pool_with(&[("HAN", "SGN"), ("SGN", "BKK")]);
        let mut r = route(&["HAN", "SGN", "BKK"]);
        r.all1 = Some(HashSet::from(["OW".to_string()]));
        r.all3 = Some(HashSet::from(["ST".to_string()]));

        let planned = plan_routes(&[r], &pool, CityGroups::instance(), false);
        let segments = &planned[0].segments;
        assert!(segments[0].alliance.as_ref().unwrap().contains("OW"));
        assert!(segments[1].alliance.as_ref().unwrap().contains("ST"));
    }
}
