//! Opportunistic per-route usage metrics.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/22/2026 - Initial implementation (Claude)

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Cumulative counters for one route key, as stored in route_metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetrics {
    pub count: u64,
    pub day_count: u64,
}

impl RouteMetrics {
    /// Average daily volume; zero until a full day has been recorded.
    pub fn daily_average(&self) -> f64 {
        if self.day_count == 0 {
            0.0
        } else {
            self.count as f64 / self.day_count as f64
        }
    }
}

/// Metrics sink collaborator. Updates are fire-and-forget: the orchestrator
/// spawns them and a failed write only logs.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record_route_query(&self, route_id: &str, upstream_requests: u32) -> Result<()>;
}

/// In-memory sink for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryMetricsSink {
    routes: Mutex<HashMap<String, RouteMetrics>>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashMap<String, RouteMetrics> {
        self.routes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSink for MemoryMetricsSink {
    async fn record_route_query(&self, route_id: &str, upstream_requests: u32) -> Result<()> {
        let mut routes = self.routes.lock().unwrap();
        let entry = routes.entry(route_id.to_string()).or_default();
        entry.count += upstream_requests as u64;
        entry.day_count += 1;
        Ok(())
    }
}
