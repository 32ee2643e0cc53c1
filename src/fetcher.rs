//! Availability fan-out with subquery caching and quota bookkeeping.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/19/2026 - Initial implementation (Claude)

use std::sync::Arc;

use crate::api::availability::{AvailabilityQuery, AvailabilityReply, AvailabilitySource};
use crate::cache::CacheFacade;
use crate::models::flight::{Group, PricingEntry};
use crate::pool::run_pool;

/// Offers returned for one route-group subquery. An errored subquery
/// contributes an empty set; the fan-out never fails as a whole.
#[derive(Debug, Clone)]
pub struct SubqueryResult {
    pub route_id: String,
    pub groups: Vec<Group>,
    pub pricing: Vec<PricingEntry>,
    pub errored: bool,
    /// Upstream HTTP requests this subquery cost (zero on cache hit or error).
    pub upstream_requests: u32,
}

/// Merged fan-out output.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub results: Vec<SubqueryResult>,
    /// Most-constrained projected quota across live subqueries.
    pub min_rate_limit_remaining: Option<i64>,
    pub min_rate_limit_reset: Option<i64>,
    pub total_upstream_requests: u32,
}

pub struct AvailabilityFetcher {
    source: Arc<dyn AvailabilitySource>,
    cache: Arc<CacheFacade>,
    concurrency: usize,
}

struct SubqueryOutcome {
    result: SubqueryResult,
    rate_limit_remaining: Option<i64>,
    rate_limit_reset: Option<i64>,
    upstream_requests: u32,
}

impl AvailabilityFetcher {
    pub fn new(
        source: Arc<dyn AvailabilitySource>,
        cache: Arc<CacheFacade>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            cache,
            concurrency,
        }
    }

    /// Fan out every subquery at the configured concurrency and merge the
    /// provider's quota headers by taking the minimum.
    pub async fn fetch_all(
        &self,
        queries: Vec<AvailabilityQuery>,
        pro_key: Option<String>,
    ) -> FetchOutcome {
        let tasks: Vec<_> = queries
            .into_iter()
            .map(|query| {
                let pro_key = pro_key.clone();
                async move { Ok(self.fetch_one(query, pro_key.as_deref()).await) }
            })
            .collect();

        // Tasks never fail (errors demote to empty subqueries), so the pool
        // error path is unreachable here.
        let outcomes = run_pool(tasks, self.concurrency)
            .await
            .unwrap_or_else(|_| Vec::new());

        let mut merged = FetchOutcome {
            results: Vec::with_capacity(outcomes.len()),
            min_rate_limit_remaining: None,
            min_rate_limit_reset: None,
            total_upstream_requests: 0,
        };
        for outcome in outcomes {
            merged.min_rate_limit_remaining = min_opt(
                merged.min_rate_limit_remaining,
                outcome.rate_limit_remaining,
            );
            merged.min_rate_limit_reset =
                min_opt(merged.min_rate_limit_reset, outcome.rate_limit_reset);
            merged.total_upstream_requests += outcome.upstream_requests;
            merged.results.push(outcome.result);
        }
        merged
    }

    async fn fetch_one(&self, query: AvailabilityQuery, pro_key: Option<&str>) -> SubqueryOutcome {
        let cache_key = CacheFacade::availability_key(&query.canonical());

        if let Some(cached) = self.cache.get_json::<AvailabilityReply>(&cache_key).await {
            tracing::debug!("Availability cache HIT for {}", query.route_id);
            return SubqueryOutcome {
                result: SubqueryResult {
                    route_id: query.route_id,
                    groups: cached.groups,
                    pricing: cached.pricing,
                    errored: false,
                    upstream_requests: 0,
                },
                // Stored headers are stale by definition; only live replies
                // feed the quota merge, and a cache hit spends no upstream
                // requests.
                rate_limit_remaining: None,
                rate_limit_reset: None,
                upstream_requests: 0,
            };
        }

        match self.source.fetch(&query, pro_key).await {
            Ok(reply) => {
                let stored = AvailabilityReply {
                    groups: reply.groups.clone(),
                    pricing: reply.pricing.clone(),
                    rate_limit_remaining: None,
                    rate_limit_reset: None,
                    upstream_requests: 0,
                };
                self.cache.set_json(&cache_key, &stored).await;

                SubqueryOutcome {
                    result: SubqueryResult {
                        route_id: query.route_id,
                        groups: reply.groups,
                        pricing: reply.pricing,
                        errored: false,
                        upstream_requests: reply.upstream_requests,
                    },
                    rate_limit_remaining: reply.rate_limit_remaining,
                    rate_limit_reset: reply.rate_limit_reset,
                    upstream_requests: reply.upstream_requests,
                }
            }
            Err(e) => {
                tracing::warn!("Availability subquery {} failed: {}", query.route_id, e);
                SubqueryOutcome {
                    result: SubqueryResult {
                        route_id: query.route_id,
                        groups: Vec::new(),
                        pricing: Vec::new(),
                        errored: true,
                        upstream_requests: 0,
                    },
                    rate_limit_remaining: None,
                    rate_limit_reset: None,
                    upstream_requests: 0,
                }
            }
        }
    }
}

fn min_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) => Some(x),
        (None, y) => y,
    }
}
