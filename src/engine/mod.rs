//! The itinerary composition engine: pools, matrices, composer, pipeline.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/19/2026 - Initial implementation (Claude)

pub mod composer;
pub mod connections;
pub mod metadata;
pub mod pools;
pub mod postprocess;
pub mod prefilter;

pub use composer::{compose_itineraries, compose_route, Itinerary};
pub use connections::{build_connection_index, ConnectionIndex};
pub use metadata::{facet_metadata, filter_sort_paginate, precompute_metadata};
pub use pools::{build_pools, PricingIndex, SegmentPool};
pub use postprocess::post_process;
pub use prefilter::{plan_routes, PlannedRoute, PlannedSegment};
