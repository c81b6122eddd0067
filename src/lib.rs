//! Community Pulse - Deterministic analytics engine for community engagement
//!
//! Pulse turns a snapshot of chat messages, member records and voice sessions
//! into dashboard metrics through a deterministic pipeline: record adaptation →
//! window filtering → sentiment, growth, orbit and channel-series computation →
//! report encoding.
//!
//! ## Modules
//!
//! - **Schema**: Loosely typed record bundles and their canonicalization
//! - **Pipeline**: One-shot analysis and a memoizing stateful processor
//! - **FFI**: C bindings over the pipeline

pub mod config;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod growth;
pub mod orbit;
pub mod pipeline;
pub mod schema;
pub mod sentiment;
pub mod series;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::AnalyticsConfig;
pub use encoder::{PulseReport, ReportEncoder};
pub use error::{AnalyticsError, ScoreError};
pub use pipeline::{analyze, records_to_report, PulseProcessor};
pub use sentiment::{LexiconScorer, SentimentScorer};
pub use types::{AnalysisRequest, ChannelFilter, CommunityRecords, DerivedMetrics, Orbit};

// Schema exports
pub use schema::{RecordAdapter, RecordBundle, RecordIssue};

/// Pulse version embedded in all reports
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "community-pulse";
