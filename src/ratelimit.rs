//! Sliding-window rate-limit gate.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/20/2026 - Free-tier validations (Claude)
//! 07/18/2026 - Initial implementation (Claude)

use std::sync::Arc;
use std::time::Duration;

use crate::error::EngineError;
use crate::kv::KvStore;
use crate::models::{BuildItinerariesRequest, FilterParams};

const SEARCH_WINDOW: Duration = Duration::from_secs(5 * 60);
const DAY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
const PAGINATION_WINDOW: Duration = Duration::from_secs(3);

const UNIQUE_SEARCHES_PER_WINDOW: i64 = 10;
const UNIQUE_SEARCHES_PER_DAY: i64 = 10;
const TOTAL_REQUESTS_PER_WINDOW: i64 = 200;
const TOTAL_REQUESTS_PER_DAY: i64 = 2000;

pub const REASON_UNIQUE_SEARCHES: &str = "unique searches";
pub const REASON_TOTAL_REQUESTS: &str = "total requests";
pub const REASON_PAGINATION: &str = "pagination";
pub const REASON_FREE_TIER_DATES: &str = "free tier allows a date span of at most 3 days";
pub const REASON_FREE_TIER_STOPS: &str = "free tier allows maxStop of at most 2";
pub const REASON_FREE_TIER_CODES: &str = "free tier allows at most 4 origin-destination combinations";
pub const REASON_FREE_TIER_PAGE_SIZE: &str = "free tier allows a pageSize of at most 10";

/// Per-client gate backed by atomic KV counters.
///
/// Counters are best-effort: every KV failure defaults to permit, so an
/// outage degrades enforcement rather than availability.
pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Enforce every policy in one pass; Ok(()) admits the request.
    pub async fn check(
        &self,
        client_ip: &str,
        request: &BuildItinerariesRequest,
        params: &FilterParams,
    ) -> Result<(), EngineError> {
        if request.api_key.is_none() {
            free_tier_check(request, params)?;
        }

        // Total requests, 5-minute and daily windows.
        if let Some(count) = self
            .try_incr(&format!("rl:total:5m:{}", client_ip), SEARCH_WINDOW)
            .await
        {
            if count > TOTAL_REQUESTS_PER_WINDOW {
                return Err(limited(SEARCH_WINDOW, REASON_TOTAL_REQUESTS));
            }
        }
        if let Some(count) = self
            .try_incr(&format!("rl:total:day:{}", client_ip), DAY_WINDOW)
            .await
        {
            if count > TOTAL_REQUESTS_PER_DAY {
                return Err(limited(DAY_WINDOW, REASON_TOTAL_REQUESTS));
            }
        }

        // Pagination: one per 3 seconds.
        if params.is_pagination() {
            if let Some(count) = self
                .try_incr(&format!("rl:page:{}", client_ip), PAGINATION_WINDOW)
                .await
            {
                if count > 1 {
                    return Err(limited(PAGINATION_WINDOW, REASON_PAGINATION));
                }
            }
        }

        // Unique searches: the first sighting of a core tuple in each window
        // counts; repeats (pagination, re-filtering) are total-limited only.
        let tuple = request.search_tuple_hash();
        if let Some(first_seen) = self
            .try_incr(&format!("rl:seen:5m:{}:{}", client_ip, tuple), SEARCH_WINDOW)
            .await
        {
            if first_seen == 1 {
                if let Some(count) = self
                    .try_incr(&format!("rl:unique:5m:{}", client_ip), SEARCH_WINDOW)
                    .await
                {
                    if count > UNIQUE_SEARCHES_PER_WINDOW {
                        return Err(limited(SEARCH_WINDOW, REASON_UNIQUE_SEARCHES));
                    }
                }
            }
        }
        if let Some(first_seen) = self
            .try_incr(&format!("rl:seen:day:{}:{}", client_ip, tuple), DAY_WINDOW)
            .await
        {
            if first_seen == 1 {
                if let Some(count) = self
                    .try_incr(&format!("rl:unique:day:{}", client_ip), DAY_WINDOW)
                    .await
                {
                    if count > UNIQUE_SEARCHES_PER_DAY {
                        return Err(limited(DAY_WINDOW, REASON_UNIQUE_SEARCHES));
                    }
                }
            }
        }

        Ok(())
    }

    async fn try_incr(&self, key: &str, ttl: Duration) -> Option<i64> {
        match self.kv.incr(key, ttl).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!("Rate-limit counter unavailable ({}); permitting: {}", key, e);
                None
            }
        }
    }
}

fn limited(window: Duration, reason: &str) -> EngineError {
    EngineError::RateLimited {
        retry_after_secs: window.as_secs(),
        reason: reason.to_string(),
    }
}

fn free_tier_check(
    request: &BuildItinerariesRequest,
    params: &FilterParams,
) -> Result<(), EngineError> {
    let deny = |reason: &str| {
        Err(EngineError::RateLimited {
            retry_after_secs: 0,
            reason: reason.to_string(),
        })
    };

    if request.date_span_days() > 3 {
        return deny(REASON_FREE_TIER_DATES);
    }
    if request.max_stop > 2 {
        return deny(REASON_FREE_TIER_STOPS);
    }
    if request.origin_codes().len() * request.destination_codes().len() > 4 {
        return deny(REASON_FREE_TIER_CODES);
    }
    if params.effective_page_size() > 10 {
        return deny(REASON_FREE_TIER_PAGE_SIZE);
    }
    Ok(())
}
