//! Engine configuration
//!
//! Every threshold the analytics stages depend on lives here as a named constant.
//! `AnalyticsConfig` groups them so a deployment can override them from a JSON
//! file; the defaults reproduce the dashboard's behavior exactly.

use crate::error::AnalyticsError;
use serde::{Deserialize, Serialize};

/// Average sentiment above this is `Positive`
pub const DEFAULT_POSITIVE_THRESHOLD: f64 = 0.05;

/// Average sentiment below this is `Negative`
pub const DEFAULT_NEGATIVE_THRESHOLD: f64 = -0.05;

/// Ambassadors need more than 50 messages
pub const DEFAULT_AMBASSADOR_MIN_MESSAGES: u64 = 51;
pub const DEFAULT_AMBASSADOR_RECENCY_DAYS: i64 = 7;

pub const DEFAULT_CONTRIBUTOR_MIN_MESSAGES: u64 = 10;
pub const DEFAULT_CONTRIBUTOR_RECENCY_DAYS: i64 = 14;

pub const DEFAULT_MEMBER_MIN_MESSAGES: u64 = 1;
pub const DEFAULT_MEMBER_RECENCY_DAYS: i64 = 30;

/// Members who joined within this many days of the window end are retention candidates
pub const DEFAULT_RETENTION_JOIN_DAYS: i64 = 30;

/// Candidates active within this many days of the window end count as retained
pub const DEFAULT_RETENTION_ACTIVITY_DAYS: i64 = 7;

/// Soft cap on the analysis window; longer requests are clamped
pub const DEFAULT_MAX_WINDOW_DAYS: i64 = 180;

/// Trailing window for "active members" and "new messages"
pub const DEFAULT_ACTIVE_WINDOW_DAYS: i64 = 7;

/// Upper bound for every day count in the configuration (about a century)
pub const MAX_CONFIG_DAYS: i64 = 36_500;

pub const DEFAULT_TOP_AMBASSADORS: usize = 5;

pub const DEFAULT_RECENT_VOICE_SESSIONS: usize = 5;

/// Sentiment classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentThresholds {
    pub positive: f64,
    pub negative: f64,
}

impl Default for SentimentThresholds {
    fn default() -> Self {
        Self {
            positive: DEFAULT_POSITIVE_THRESHOLD,
            negative: DEFAULT_NEGATIVE_THRESHOLD,
        }
    }
}

/// Message volume and recency requirements for each orbit tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitThresholds {
    pub ambassador_min_messages: u64,
    pub ambassador_recency_days: i64,
    pub contributor_min_messages: u64,
    pub contributor_recency_days: i64,
    pub member_min_messages: u64,
    pub member_recency_days: i64,
}

impl Default for OrbitThresholds {
    fn default() -> Self {
        Self {
            ambassador_min_messages: DEFAULT_AMBASSADOR_MIN_MESSAGES,
            ambassador_recency_days: DEFAULT_AMBASSADOR_RECENCY_DAYS,
            contributor_min_messages: DEFAULT_CONTRIBUTOR_MIN_MESSAGES,
            contributor_recency_days: DEFAULT_CONTRIBUTOR_RECENCY_DAYS,
            member_min_messages: DEFAULT_MEMBER_MIN_MESSAGES,
            member_recency_days: DEFAULT_MEMBER_RECENCY_DAYS,
        }
    }
}

/// Retention windows, both measured back from the end of the analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionWindows {
    pub join_days: i64,
    pub activity_days: i64,
}

impl Default for RetentionWindows {
    fn default() -> Self {
        Self {
            join_days: DEFAULT_RETENTION_JOIN_DAYS,
            activity_days: DEFAULT_RETENTION_ACTIVITY_DAYS,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub sentiment: SentimentThresholds,
    pub orbit: OrbitThresholds,
    pub retention: RetentionWindows,
    pub max_window_days: i64,
    pub active_window_days: i64,
    pub top_ambassadors: usize,
    pub recent_voice_sessions: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sentiment: SentimentThresholds::default(),
            orbit: OrbitThresholds::default(),
            retention: RetentionWindows::default(),
            max_window_days: DEFAULT_MAX_WINDOW_DAYS,
            active_window_days: DEFAULT_ACTIVE_WINDOW_DAYS,
            top_ambassadors: DEFAULT_TOP_AMBASSADORS,
            recent_voice_sessions: DEFAULT_RECENT_VOICE_SESSIONS,
        }
    }
}

impl AnalyticsConfig {
    /// Load and validate a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, AnalyticsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make the stages meaningless
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if !self.sentiment.positive.is_finite() || !self.sentiment.negative.is_finite() {
            return Err(AnalyticsError::InvalidConfig(
                "sentiment thresholds must be finite".to_string(),
            ));
        }
        if self.sentiment.positive < self.sentiment.negative {
            return Err(AnalyticsError::InvalidConfig(format!(
                "positive threshold {} is below negative threshold {}",
                self.sentiment.positive, self.sentiment.negative
            )));
        }
        if !(1..=MAX_CONFIG_DAYS).contains(&self.max_window_days) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "max_window_days must be between 1 and {MAX_CONFIG_DAYS} (got {})",
                self.max_window_days
            )));
        }

        let windows = [
            ("orbit.ambassador_recency_days", self.orbit.ambassador_recency_days),
            ("orbit.contributor_recency_days", self.orbit.contributor_recency_days),
            ("orbit.member_recency_days", self.orbit.member_recency_days),
            ("retention.join_days", self.retention.join_days),
            ("retention.activity_days", self.retention.activity_days),
            ("active_window_days", self.active_window_days),
        ];
        if let Some((name, days)) = windows
            .iter()
            .find(|(_, days)| !(0..=MAX_CONFIG_DAYS).contains(days))
        {
            return Err(AnalyticsError::InvalidConfig(format!(
                "{name} must be between 0 and {MAX_CONFIG_DAYS} (got {days})"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.sentiment.positive, 0.05);
        assert_eq!(config.sentiment.negative, -0.05);
        assert_eq!(config.orbit.ambassador_min_messages, 51);
        assert_eq!(config.orbit.contributor_min_messages, 10);
        assert_eq!(config.orbit.member_min_messages, 1);
        assert_eq!(config.retention.join_days, 30);
        assert_eq!(config.retention.activity_days, 7);
        assert_eq!(config.max_window_days, 180);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            AnalyticsConfig::from_json(r#"{"max_window_days": 90, "orbit": {"member_recency_days": 60}}"#)
                .unwrap();
        assert_eq!(config.max_window_days, 90);
        assert_eq!(config.orbit.member_recency_days, 60);
        assert_eq!(config.orbit.ambassador_recency_days, 7);
        assert_eq!(config.top_ambassadors, 5);
    }

    #[test]
    fn test_inverted_sentiment_thresholds_rejected() {
        let result =
            AnalyticsConfig::from_json(r#"{"sentiment": {"positive": -0.2, "negative": 0.2}}"#);
        assert!(matches!(result, Err(AnalyticsError::InvalidConfig(_))));
    }

    #[test]
    fn test_negative_window_rejected() {
        let result = AnalyticsConfig::from_json(r#"{"retention": {"join_days": -1}}"#);
        assert!(matches!(result, Err(AnalyticsError::InvalidConfig(_))));
    }

    #[test]
    fn test_oversized_windows_rejected() {
        let huge = AnalyticsConfig::from_json(r#"{"orbit": {"member_recency_days": 9223372036854775807}}"#);
        assert!(matches!(huge, Err(AnalyticsError::InvalidConfig(_))));

        let cap = AnalyticsConfig::from_json(r#"{"max_window_days": 36501}"#);
        assert!(matches!(cap, Err(AnalyticsError::InvalidConfig(_))));

        let config = AnalyticsConfig {
            active_window_days: MAX_CONFIG_DAYS + 1,
            ..AnalyticsConfig::default()
        };
        assert!(config.validate().is_err());

        let edge = AnalyticsConfig::from_json(
            r#"{"max_window_days": 36500, "retention": {"join_days": 36500, "activity_days": 0}}"#,
        );
        assert!(edge.is_ok());
    }

    #[test]
    fn test_zero_window_cap_rejected() {
        let result = AnalyticsConfig::from_json(r#"{"max_window_days": 0}"#);
        assert!(result.is_err());
    }
}
