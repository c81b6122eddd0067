//! Report encoding
//!
//! Wraps derived metrics in a versioned report envelope that records which
//! engine produced it and for which evaluation instant.

use crate::error::AnalyticsError;
use crate::types::DerivedMetrics;
use crate::{PRODUCER_NAME, PULSE_VERSION};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Current report envelope version
pub const REPORT_VERSION: &str = "1.0.0";

/// Engine that produced a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Versioned report envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulseReport {
    pub report_version: String,
    pub producer: ReportProducer,
    /// The request's `now`, never the wall clock
    pub evaluated_at: DateTime<Utc>,
    pub metrics: DerivedMetrics,
}

/// Report encoder for producing JSON payloads
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap metrics in a report
    pub fn encode(&self, metrics: &DerivedMetrics) -> PulseReport {
        PulseReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: PULSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            evaluated_at: metrics.window.evaluated_at,
            metrics: metrics.clone(),
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, metrics: &DerivedMetrics) -> Result<String, AnalyticsError> {
        let report = self.encode(metrics);
        serde_json::to_string_pretty(&report).map_err(AnalyticsError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::pipeline::analyze;
    use crate::sentiment::LexiconScorer;
    use crate::types::{AnalysisRequest, CommunityRecords};
    use chrono::{NaiveDate, TimeZone};

    fn empty_metrics() -> DerivedMetrics {
        let request = AnalysisRequest::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
        );
        analyze(
            &CommunityRecords::default(),
            &request,
            &LexiconScorer,
            &AnalyticsConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_encode_report() {
        let metrics = empty_metrics();
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(&metrics);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.version, PULSE_VERSION);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(
            report.evaluated_at,
            Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_encode_to_json() {
        let encoder = ReportEncoder::new();
        let json = encoder.encode_to_json(&empty_metrics()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("report_version").is_some());
        assert!(parsed.get("producer").is_some());
        assert_eq!(parsed["metrics"]["window"]["start"], "2024-01-01");
        assert_eq!(parsed["metrics"]["sentiment"]["sentiment_status"], "Neutral");
        assert_eq!(parsed["metrics"]["channels"], serde_json::json!(["all"]));
    }

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(ReportEncoder::new().instance_id(), ReportEncoder::new().instance_id());
    }
}
