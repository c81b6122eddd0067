//! Error types for Community Pulse

use thiserror::Error;

/// Errors that can occur at the engine boundary.
///
/// Record content never produces one of these: malformed records are dropped or
/// defaulted and surface in the diagnostics instead.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a sentiment scorer for a single text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("scorer rejected input: {0}")]
    Rejected(String),

    #[error("scorer returned a non-finite score")]
    NonFinite,
}
