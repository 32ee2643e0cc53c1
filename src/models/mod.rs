//! Data models for the itinerary engine.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/18/2026 - Initial implementation (Claude)

pub mod flight;
pub mod request;
pub mod response;
pub mod route;

pub use flight::*;
pub use request::*;
pub use response::*;
pub use route::{derive_route_key, CityGroups, RouteGroup, RoutePath};
