//! Clients for the route-topology and availability collaborators.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/18/2026 - Initial implementation (Claude)

pub mod availability;
pub mod routes;

pub use availability::{
    AvailabilityClient, AvailabilityQuery, AvailabilityReply, AvailabilitySource,
};
pub use routes::{RouteSource, RouteTopologyClient, RouteTopologyRequest, RouteTopologyResponse};
