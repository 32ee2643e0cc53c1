//! Availability provider client.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/19/2026 - Rate-limit header parsing (Claude)
//! 07/18/2026 - Initial implementation (Claude)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::flight::{Group, PricingEntry};

const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Body of `POST {base}/availability-v2` for one route group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    /// Compact route group, e.g. "NRT/HND-LAX".
    pub route_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carriers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub united: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binbin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stop: Option<u8>,
}

impl AvailabilityQuery {
    /// Canonical form used as the subquery cache key.
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityBody {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    pricing: Vec<PricingEntry>,
    /// Upstream HTTP requests the provider spent answering this call.
    #[serde(default)]
    http_requests: Option<u32>,
}

/// One subquery's offers plus the provider's quota bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReply {
    pub groups: Vec<Group>,
    pub pricing: Vec<PricingEntry>,
    pub rate_limit_remaining: Option<i64>,
    pub rate_limit_reset: Option<i64>,
    pub upstream_requests: u32,
}

/// Seam for the availability provider.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    async fn fetch(
        &self,
        query: &AvailabilityQuery,
        pro_key: Option<&str>,
    ) -> Result<AvailabilityReply>;
}

/// HTTP client for the availability provider.
pub struct AvailabilityClient {
    client: Client,
    base_url: String,
}

impl AvailabilityClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(std::time::Duration::from_secs(60))
            .user_agent("award-routes/0.1.0")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl AvailabilitySource for AvailabilityClient {
    async fn fetch(
        &self,
        query: &AvailabilityQuery,
        pro_key: Option<&str>,
    ) -> Result<AvailabilityReply> {
        let url = format!("{}/availability-v2", self.base_url);

        let mut request = self.client.post(&url).json(query);
        if let Some(key) = pro_key {
            request = request.header("x-pro-key", key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to query availability for {}", query.route_id))?;

        let rate_limit_remaining = header_i64(&response, RATELIMIT_REMAINING);
        let rate_limit_reset = header_i64(&response, RATELIMIT_RESET);

        let status = response.status();
        if !status.is_success() {
            bail!("availability provider returned {} for {}", status, query.route_id);
        }

        let body: AvailabilityBody = response
            .json()
            .await
            .with_context(|| format!("Failed to parse availability body for {}", query.route_id))?;

        Ok(AvailabilityReply {
            groups: body.groups,
            pricing: body.pricing,
            rate_limit_remaining,
            rate_limit_reset,
            upstream_requests: body.http_requests.unwrap_or(1),
        })
    }
}

fn header_i64(response: &reqwest::Response, name: &str) -> Option<i64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn query() -> AvailabilityQuery {
        AvailabilityQuery {
            route_id: "SGN-HAN".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
            cabin: None,
            carriers: None,
            seats: None,
            united: None,
            binbin: None,
            max_stop: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_parses_groups_and_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/availability-v2")
                .header("x-pro-key", "secret");
            then.status(200)
                .header("x-ratelimit-remaining", "117")
                .header("x-ratelimit-reset", "1770000000")
                .json_body(json!({
                    "groups": [{
                        "origin": "SGN",
                        "destination": "HAN",
                        "date": "2026-02-11",
                        "alliance": "ST",
                        "source": "lifemiles",
                        "flights": [{
                            "flightNumber": "VN220",
                            "departsAt": "2026-02-11T06:00:00+07:00",
                            "arrivesAt": "2026-02-11T08:05:00+07:00",
                            "durationMinutes": 125,
                            "origin": "SGN",
                            "destination": "HAN",
                            "seats": {"y": 9, "w": 0, "j": 2, "f": 0},
                            "partner": {"y": true, "w": false, "j": true, "f": false},
                            "source": "lifemiles"
                        }]
                    }],
                    "httpRequests": 3
                }));
        });

        let client = AvailabilityClient::new(server.base_url()).unwrap();
        let reply = client.fetch(&query(), Some("secret")).await.unwrap();

        mock.assert();
        assert_eq!(reply.groups.len(), 1);
        assert_eq!(reply.groups[0].flights[0].flight_number, "VN220");
        assert_eq!(reply.rate_limit_remaining, Some(117));
        assert_eq!(reply.rate_limit_reset, Some(1770000000));
        assert_eq!(reply.upstream_requests, 3);
    }

    #[tokio::test]
    async fn test_fetch_error_carries_route() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/availability-v2");
            then.status(429).header("x-ratelimit-remaining", "0");
        });

        let client = AvailabilityClient::new(server.base_url()).unwrap();
        let err = client.fetch(&query(), None).await.unwrap_err();
        assert!(err.to_string().contains("SGN-HAN"));
    }

    #[test]
    fn test_canonical_is_stable() {
        assert_eq!(query().canonical(), query().canonical());
        let mut other = query();
        other.cabin = Some("J".into());
        assert_ne!(query().canonical(), other.canonical());
    }
}
