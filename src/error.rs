//! Error types for the itinerary engine.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/18/2026 - Initial implementation (Claude)

use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Errors surfaced by the engine.
///
/// Non-fatal failures (KV outages, partial availability, stale reliability
/// tables) are recovered locally and never reach this enum.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Request body or query parameters failed validation.
    #[error("invalid input: {}", summarize(.details))]
    InvalidInput { details: Vec<FieldError> },

    /// Route topology returned no candidate paths.
    #[error("no eligible routes")]
    NoRoutes,

    /// Route topology or another required upstream is unavailable.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Rate limit exceeded.
    #[error("rate limited ({reason}, retry after {retry_after_secs}s)")]
    RateLimited {
        retry_after_secs: u64,
        reason: String,
    },

    /// No provider credential with remaining quota.
    #[error("no availability credential with remaining quota")]
    CredentialExhausted,

    /// Catch-all; display is safe to return to callers.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Create a validation error for a single field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            details: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// HTTP status code the ingress collaborator should map this to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::NoRoutes => 404,
            Self::RateLimited { .. } => 429,
            Self::UpstreamUnavailable(_) | Self::CredentialExhausted | Self::Internal(_) => 500,
        }
    }
}

fn summarize(details: &[FieldError]) -> String {
    details
        .iter()
        .map(|d| format!("{}: {}", d.field, d.message))
        .collect::<Vec<_>>()
        .join("; ")
}
