//! Route-topology collaborator client.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/18/2026 - Initial implementation (Claude)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::route::RoutePath;

/// Body of `POST {base}/create-full-route-path`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTopologyRequest {
    pub origin: String,
    pub destination: String,
    pub max_stop: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binbin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<bool>,
}

/// Candidate paths plus the availability subqueries that cover them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTopologyResponse {
    pub routes: Vec<RoutePath>,
    /// Compact `ORIG1/ORIG2-DEST1/DEST2` subquery strings.
    pub query_params_arr: Vec<String>,
    #[serde(default)]
    pub airport_list: Option<Vec<String>>,
}

/// Seam for the route-topology collaborator.
#[async_trait]
pub trait RouteSource: Send + Sync {
    async fn create_full_route_path(
        &self,
        request: &RouteTopologyRequest,
    ) -> Result<RouteTopologyResponse, EngineError>;
}

/// HTTP client for the route-topology service.
pub struct RouteTopologyClient {
    client: Client,
    base_url: String,
}

impl RouteTopologyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(std::time::Duration::from_secs(30))
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
impl RouteSource for RouteTopologyClient {
    async fn create_full_route_path(
        &self,
        request: &RouteTopologyRequest,
    ) -> Result<RouteTopologyResponse, EngineError> {
        let url = format!("{}/create-full-route-path", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| EngineError::UpstreamUnavailable(format!("route topology: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::UpstreamUnavailable(format!(
                "route topology returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::UpstreamUnavailable(format!("route topology body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> RouteTopologyRequest {
        RouteTopologyRequest {
            origin: "SGN".into(),
            destination: "BKK".into(),
            max_stop: 1,
            binbin: None,
            region: None,
        }
    }

    #[tokio::test]
    async fn test_parses_routes() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/create-full-route-path")
                .json_body(json!({"origin": "SGN", "destination": "BKK", "maxStop": 1}));
            then.status(200).json_body(json!({
                "routes": [
                    {"waypoints": ["SGN", "BKK"]},
                    {"waypoints": ["SGN", "HAN", "BKK"], "all2": ["ST"]}
                ],
                "queryParamsArr": ["SGN-BKK", "SGN-HAN", "HAN-BKK"]
            }));
        });

        let client = RouteTopologyClient::new(server.base_url()).unwrap();
        let response = client.create_full_route_path(&request()).await.unwrap();

        mock.assert();
        assert_eq!(response.routes.len(), 2);
        assert_eq!(response.routes[1].waypoints, vec!["SGN", "HAN", "BKK"]);
        assert!(response.routes[1].all2.as_ref().unwrap().contains("ST"));
        assert_eq!(response.query_params_arr.len(), 3);
    }

    #[tokio::test]
    async fn test_upstream_error_maps_to_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/create-full-route-path");
            then.status(502);
        });

        let client = RouteTopologyClient::new(server.base_url()).unwrap();
        let err = client.create_full_route_path(&request()).await.unwrap_err();
        assert!(matches!(err, EngineError::UpstreamUnavailable(_)));
        assert_eq!(err.status_code(), 500);
    }
}
