//! Orchestrator: the build-itineraries request flow.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/22/2026 - Credential CAS rotation and route metrics (Claude)
//! 07/20/2026 - Initial implementation (Claude)

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::availability::{AvailabilityQuery, AvailabilitySource};
use crate::api::routes::{RouteSource, RouteTopologyRequest};
use crate::cache::CacheFacade;
use crate::config::EngineConfig;
use crate::credentials::CredentialStore;
use crate::engine::{
    build_connection_index, build_pools, compose_itineraries, facet_metadata,
    filter_sort_paginate, plan_routes, post_process, precompute_metadata, Itinerary, PlannedRoute,
};
use crate::error::EngineError;
use crate::fetcher::{AvailabilityFetcher, FetchOutcome};
use crate::kv::KvStore;
use crate::metrics::MetricsSink;
use crate::models::route::{CityGroups, RouteGroup};
use crate::models::{
    BuildItinerariesRequest, BuildItinerariesResponse, FilterParams, Flight, PricingEntry,
    RawSearchRecord,
};
use crate::optimizer::optimize_route_groups;
use crate::pool::run_pool;
use crate::ratelimit::RateLimiter;
use crate::reliability::{ReliabilityCache, ReliabilitySource};

/// The itinerary engine, wired to its collaborators.
pub struct ItineraryService {
    config: EngineConfig,
    routes: Arc<dyn RouteSource>,
    cache: Arc<CacheFacade>,
    rate_limiter: RateLimiter,
    reliability: ReliabilityCache,
    credentials: Arc<dyn CredentialStore>,
    metrics: Arc<dyn MetricsSink>,
    fetcher: AvailabilityFetcher,
}

impl ItineraryService {
    pub fn new(
        config: EngineConfig,
        routes: Arc<dyn RouteSource>,
        availability: Arc<dyn AvailabilitySource>,
        kv: Arc<dyn KvStore>,
        reliability_source: Arc<dyn ReliabilitySource>,
        credentials: Arc<dyn CredentialStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let cache = Arc::new(CacheFacade::new(kv.clone(), config.cache_ttl));
        let rate_limiter = RateLimiter::new(kv);
        let reliability = ReliabilityCache::new(reliability_source, config.reliability_ttl);
        let fetcher =
            AvailabilityFetcher::new(availability, cache.clone(), config.availability_concurrency);

        Self {
            config,
            routes,
            cache,
            rate_limiter,
            reliability,
            credentials,
            metrics,
            fetcher,
        }
    }

    /// Handle one build-itineraries request end to end.
    pub async fn build_itineraries(
        &self,
        client_ip: &str,
        request: BuildItinerariesRequest,
        params: FilterParams,
    ) -> Result<BuildItinerariesResponse, EngineError> {
        request.validate()?;
        params.validate()?;
        self.rate_limiter.check(client_ip, &request, &params).await?;

        let raw_key = CacheFacade::raw_key(
            &request.origin,
            &request.destination,
            &request.core_params_hash(),
        );
        let filtered_key = CacheFacade::filtered_key(&raw_key, &params.filter_hash());

        if let Some(response) = self
            .cache
            .get_json::<BuildItinerariesResponse>(&filtered_key)
            .await
        {
            return Ok(response);
        }
        if let Some(raw) = self.cache.get_json::<RawSearchRecord>(&raw_key).await {
            let response = respond_from_raw(&raw, &params);
            self.cache.set_json(&filtered_key, &response).await;
            return Ok(response);
        }

        let raw = self.search(&request).await?;
        self.cache.set_json(&raw_key, &raw).await;

        let response = respond_from_raw(&raw, &params);
        self.cache.set_json(&filtered_key, &response).await;
        Ok(response)
    }

    /// Uncached search: topology, fan-out, composition, post-processing.
    async fn search(&self, request: &BuildItinerariesRequest) -> Result<RawSearchRecord, EngineError> {
        let topology = self
            .routes
            .create_full_route_path(&RouteTopologyRequest {
                origin: request.origin.clone(),
                destination: request.destination.clone(),
                max_stop: request.max_stop,
                binbin: request.binbin,
                region: request.region,
            })
            .await?;
        if topology.routes.is_empty() {
            return Err(EngineError::NoRoutes);
        }

        let credential = self
            .credentials
            .acquire()
            .await
            .map_err(EngineError::Internal)?
            .ok_or(EngineError::CredentialExhausted)?;

        let queries = self.build_queries(request, &topology.query_params_arr);
        let outcome = self
            .fetcher
            .fetch_all(queries, Some(credential.pro_key.clone()))
            .await;

        self.record_metrics(&outcome);
        self.settle_credential(&credential.pro_key, credential.remaining, &outcome)
            .await;

        let (segment_pool, pricing_index) = build_pools(outcome.results);
        let segment_pool = Arc::new(segment_pool);
        let index = Arc::new(build_connection_index(&segment_pool));

        let cities = CityGroups::instance();
        let planned = plan_routes(&topology.routes, &segment_pool, cities, request.is_region());

        let composed = self.compose(planned, segment_pool, index.clone()).await?;

        let table = self.reliability.table().await;
        let threshold = request.reliability_percent(self.config.default_reliability_percent);

        let mut flight_map = index.flight_map.clone();
        let surviving = post_process(
            composed,
            &mut flight_map,
            &table,
            threshold,
            request.start_date,
            request.end_date,
            request.is_region(),
        );

        let itineraries =
            precompute_metadata(&surviving, &flight_map, &pricing_index, &table, threshold);

        // Pricing entries no itinerary references are dropped with the
        // flight map.
        let referenced: std::collections::HashSet<&String> =
            itineraries.iter().flat_map(|i| i.pricing_ids.iter()).collect();
        let pricing: HashMap<String, PricingEntry> = pricing_index
            .pool
            .into_iter()
            .filter(|(id, _)| referenced.contains(id))
            .collect();

        tracing::info!(
            "Search {} -> {}: {} itineraries, {} flights, {} upstream requests",
            request.origin,
            request.destination,
            itineraries.len(),
            flight_map.len(),
            outcome.total_upstream_requests,
        );

        Ok(RawSearchRecord {
            itineraries,
            flights: flight_map,
            pricing,
            route_structures: topology.routes,
            rate_limit_remaining: outcome.min_rate_limit_remaining,
            rate_limit_reset: outcome.min_rate_limit_reset,
            upstream_requests: outcome.total_upstream_requests,
        })
    }

    fn build_queries(
        &self,
        request: &BuildItinerariesRequest,
        query_params_arr: &[String],
    ) -> Vec<AvailabilityQuery> {
        let mut route_ids: Vec<String> = query_params_arr.to_vec();

        if self.config.optimize_route_groups {
            let parsed: Vec<RouteGroup> = query_params_arr
                .iter()
                .filter_map(|id| RouteGroup::parse(id))
                .collect();
            route_ids = optimize_route_groups(
                &parsed,
                self.config.optimizer_offers_per_pair,
                self.config.optimizer_target_offers,
            )
            .iter()
            .map(|g| g.route_id())
            .collect();
        }

        route_ids
            .into_iter()
            .map(|route_id| AvailabilityQuery {
                route_id,
                start_date: request.start_date,
                end_date: request.end_date,
                cabin: request.cabin.clone(),
                carriers: request.carriers.clone(),
                seats: request.seats,
                united: request.united,
                binbin: request.binbin,
                max_stop: Some(request.max_stop),
            })
            .collect()
    }

    async fn compose(
        &self,
        planned: Vec<PlannedRoute>,
        pool: Arc<crate::engine::SegmentPool>,
        index: Arc<crate::engine::ConnectionIndex>,
    ) -> Result<Vec<Itinerary>, EngineError> {
        let cities = CityGroups::instance();

        if planned.len() <= self.config.parallel_route_threshold {
            return Ok(compose_itineraries(&planned, &pool, &index, cities));
        }

        // Above the threshold each route composes on a blocking thread; the
        // UUID digests are deterministic, so merging the per-route output is
        // a plain concatenation.
        let planned = Arc::new(planned);
        let tasks: Vec<_> = (0..planned.len())
            .map(|i| {
                let planned = planned.clone();
                let pool = pool.clone();
                let index = index.clone();
                async move {
                    let out = tokio::task::spawn_blocking(move || {
                        compose_itineraries(
                            &planned[i..i + 1],
                            &pool,
                            &index,
                            CityGroups::instance(),
                        )
                    })
                    .await?;
                    Ok(out)
                }
            })
            .collect();

        let per_route = run_pool(tasks, self.config.availability_concurrency).await?;
        Ok(per_route.into_iter().flatten().collect())
    }

    fn record_metrics(&self, outcome: &FetchOutcome) {
        for result in &outcome.results {
            if result.errored {
                continue;
            }
            let metrics = self.metrics.clone();
            let route_id = result.route_id.clone();
            let upstream = result.upstream_requests;
            tokio::spawn(async move {
                if let Err(e) = metrics.record_route_query(&route_id, upstream).await {
                    tracing::warn!("Route metrics update failed for {}: {}", route_id, e);
                }
            });
        }
    }

    /// Write back the provider's projected remaining quota; a lost CAS means
    /// a concurrent request already recorded a fresher value.
    async fn settle_credential(&self, pro_key: &str, read_remaining: i64, outcome: &FetchOutcome) {
        let Some(new_remaining) = outcome.min_rate_limit_remaining else {
            return;
        };
        match self
            .credentials
            .compare_and_update(pro_key, read_remaining, new_remaining)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Credential {} already updated by a concurrent request", pro_key)
            }
            Err(e) => tracing::warn!("Credential update failed for {}: {}", pro_key, e),
        }
    }
}

/// Filter, rank and paginate a raw record into the response envelope.
fn respond_from_raw(raw: &RawSearchRecord, params: &FilterParams) -> BuildItinerariesResponse {
    let (page, total) = filter_sort_paginate(&raw.itineraries, params, &raw.flights);
    let filter_metadata = facet_metadata(&raw.itineraries);

    let mut flights: HashMap<String, Flight> = HashMap::new();
    let mut pricing: HashMap<String, PricingEntry> = HashMap::new();
    for itin in &page {
        for uuid in &itin.uuids {
            if let Some(flight) = raw.flights.get(uuid) {
                flights.insert(uuid.clone(), flight.clone());
            }
        }
        for id in &itin.pricing_ids {
            if let Some(entry) = raw.pricing.get(id) {
                pricing.insert(id.clone(), entry.clone());
            }
        }
    }

    BuildItinerariesResponse {
        itineraries: page,
        flights,
        pricing: if pricing.is_empty() { None } else { Some(pricing) },
        total,
        page: params.page,
        page_size: params.effective_page_size(),
        min_rate_limit_remaining: raw.rate_limit_remaining,
        min_rate_limit_reset: raw.rate_limit_reset,
        total_upstream_http_requests: raw.upstream_requests,
        filter_metadata,
    }
}
