//! Award-ticket itinerary composition engine.
//!
//! Answers "which multi-leg award itineraries connect origin to destination
//! on a date range, under stop, alliance, cabin and reliability constraints?"
//! An external route-topology service enumerates candidate paths and an
//! external availability provider returns per-segment offers; this crate
//! fans out availability fetches, indexes valid connections, composes
//! itineraries with a stack-based DFS, filters them for reliability, and
//! ranks, paginates and caches the result.
//!
//! HTTP ingress, the relational store and the KV store are collaborators
//! behind the `RouteSource`, `AvailabilitySource`, `CredentialStore`,
//! `ReliabilitySource`, `MetricsSink` and `KvStore` traits.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/22/2026 - Route-group optimizer and credential rotation (Claude)
//! 07/18/2026 - Initial implementation (Claude)

pub mod api;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod ids;
pub mod kv;
pub mod metrics;
pub mod models;
pub mod optimizer;
pub mod pool;
pub mod ratelimit;
pub mod reliability;
pub mod service;

pub use config::EngineConfig;
pub use error::EngineError;
pub use service::ItineraryService;
