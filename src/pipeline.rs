//! Pipeline orchestration
//!
//! This module provides the public API for Community Pulse.
//! It runs one analysis pass from canonical records to derived metrics, and
//! offers JSON-in/JSON-out entry points on top of it.

use crate::config::AnalyticsConfig;
use crate::encoder::{PulseReport, ReportEncoder};
use crate::error::AnalyticsError;
use crate::filter::{DateWindow, MessageFilter};
use crate::growth::compute_growth;
use crate::orbit::OrbitClassifier;
use crate::schema::RecordAdapter;
use crate::sentiment::{score_messages, LexiconScorer, SentimentScorer};
use crate::series::channel_activity_series;
use crate::summary::{channel_options, summarize_activity, summarize_voice};
use crate::types::{AnalysisRequest, CommunityRecords, DerivedMetrics, Diagnostics};
use std::collections::VecDeque;

/// Results a processor keeps before evicting the least recently used
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Run one analysis pass.
///
/// Pipeline stages:
/// 1. DateWindow - Resolve and clamp the calendar window
/// 2. MessageFilter - Restrict messages to the window and channel
/// 3. Sentiment, growth, orbit and series components over the filtered set
/// 4. Activity and voice summaries
///
/// The pass reads no clock and mutates nothing; the same inputs always give
/// the same metrics.
pub fn analyze(
    records: &CommunityRecords,
    request: &AnalysisRequest,
    scorer: &dyn SentimentScorer,
    config: &AnalyticsConfig,
) -> Result<DerivedMetrics, AnalyticsError> {
    config.validate()?;

    // Stage 1: Resolve the window
    let window = DateWindow::from_request(request, config.max_window_days)?;

    // Stage 2: Filter messages
    let filtered = MessageFilter::filter(&records.messages, &window, &request.channel);

    // Stage 3: Components
    let sentiment = score_messages(&filtered.messages, scorer, &config.sentiment);
    let growth = compute_growth(&records.members, &window, &config.retention);
    let orbits = OrbitClassifier::new(&config.orbit, config.top_ambassadors).classify(
        &records.members,
        &filtered.messages,
        request.now,
    );
    let channel_activity_series = channel_activity_series(&filtered.messages, &window);

    // Stage 4: Summaries
    let activity = summarize_activity(
        &records.members,
        &records.messages,
        &filtered.messages,
        &window,
        config.active_window_days,
    );
    let (voice, voice_sessions_without_start) =
        summarize_voice(&records.voice_activity, &window, config.recent_voice_sessions);

    let diagnostics = Diagnostics {
        messages_without_timestamp: filtered.without_timestamp,
        voice_sessions_without_start,
        sentiment_failures: sentiment.failed_messages,
    };

    tracing::debug!(
        start = %window.start(),
        end = %window.end(),
        channel = %request.channel,
        messages = filtered.messages.len(),
        members = records.members.len(),
        "analysis pass complete"
    );

    Ok(DerivedMetrics {
        window: window.describe(request),
        activity,
        growth,
        sentiment,
        orbits,
        channel_activity_series,
        channels: channel_options(&records.messages),
        voice,
        diagnostics,
    })
}

/// Convert a raw record bundle and a request into a JSON report.
///
/// # Arguments
/// * `records_json` - `{messages, members, voice_activity}` bundle
/// * `request_json` - `{start, end, channel, now, utc_offset_minutes}`
///
/// # Example
/// ```ignore
/// let report = records_to_report(
///     bundle_json,
///     r#"{"start":"2024-01-01","end":"2024-01-31","now":"2024-02-01T00:00:00Z"}"#.to_string(),
/// )?;
/// ```
pub fn records_to_report(records_json: String, request_json: String) -> Result<String, AnalyticsError> {
    let bundle = RecordAdapter::parse_bundle(&records_json)?;
    let records = RecordAdapter::to_canonical(&bundle);
    let request = parse_request(&request_json)?;

    let metrics = analyze(&records, &request, &LexiconScorer, &AnalyticsConfig::default())?;
    ReportEncoder::new().encode_to_json(&metrics)
}

/// Parse an analysis request from JSON
pub fn parse_request(json: &str) -> Result<AnalysisRequest, AnalyticsError> {
    serde_json::from_str(json)
        .map_err(|e| AnalyticsError::ParseError(format!("Failed to parse analysis request: {}", e)))
}

/// Stateful processor holding one record snapshot.
///
/// Results are memoized per request, up to a fixed number of entries with the
/// least recently used evicted first. Loading new records drops the cache, so a
/// cached result never outlives the snapshot it was computed from.
pub struct PulseProcessor {
    config: AnalyticsConfig,
    scorer: Box<dyn SentimentScorer>,
    encoder: ReportEncoder,
    records: CommunityRecords,
    cache: VecDeque<(AnalysisRequest, DerivedMetrics)>,
    cache_capacity: usize,
}

impl Default for PulseProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self {
            config: AnalyticsConfig::default(),
            scorer: Box::new(LexiconScorer),
            encoder: ReportEncoder::new(),
            records: CommunityRecords::default(),
            cache: VecDeque::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Create a processor with a validated configuration
    pub fn with_config(config: AnalyticsConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Replace the sentiment scorer
    pub fn with_scorer(mut self, scorer: impl SentimentScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self.cache.clear();
        self
    }

    /// Keep at most `capacity` memoized results; zero disables memoization
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        while self.cache.len() > capacity {
            self.cache.pop_front();
        }
        self
    }

    /// Use a fixed report instance id
    pub fn with_instance_id(mut self, instance_id: String) -> Self {
        self.encoder = ReportEncoder::with_instance_id(instance_id);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn records(&self) -> &CommunityRecords {
        &self.records
    }

    /// Load a record snapshot from a JSON bundle
    pub fn load_records(&mut self, json: &str) -> Result<(), AnalyticsError> {
        let bundle = RecordAdapter::parse_bundle(json)?;
        self.set_records(RecordAdapter::to_canonical(&bundle));
        Ok(())
    }

    /// Replace the record snapshot
    pub fn set_records(&mut self, records: CommunityRecords) {
        self.records = records;
        self.cache.clear();
    }

    /// Analyze the current snapshot, reusing a cached result when available
    pub fn analyze(&mut self, request: &AnalysisRequest) -> Result<DerivedMetrics, AnalyticsError> {
        if let Some(position) = self.cache.iter().position(|(key, _)| key == request) {
            if let Some(entry) = self.cache.remove(position) {
                tracing::debug!(channel = %request.channel, "serving cached analysis");
                let metrics = entry.1.clone();
                self.cache.push_back(entry);
                return Ok(metrics);
            }
        }

        let metrics = analyze(&self.records, request, self.scorer.as_ref(), &self.config)?;
        if self.cache_capacity > 0 {
            if self.cache.len() >= self.cache_capacity {
                self.cache.pop_front();
            }
            self.cache.push_back((request.clone(), metrics.clone()));
        }
        Ok(metrics)
    }

    /// Analyze and wrap the result in a report from this processor's encoder
    pub fn report(&mut self, request: &AnalysisRequest) -> Result<PulseReport, AnalyticsError> {
        let metrics = self.analyze(request)?;
        Ok(self.encoder.encode(&metrics))
    }

    /// Analyze from a JSON request and return a JSON report
    pub fn process(&mut self, request_json: &str) -> Result<String, AnalyticsError> {
        let request = parse_request(request_json)?;
        let metrics = self.analyze(&request)?;
        self.encoder.encode_to_json(&metrics)
    }

    /// Number of memoized results
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoreError;
    use crate::types::{ChannelFilter, Orbit, SentimentStatus};
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn sample_bundle_json() -> &'static str {
        r#"{
            "messages": [
                {"user_id": "101", "timestamp": "2024-01-01T10:00:00Z", "content": "Great launch, love it!", "channel_name": "general"},
                {"user_id": 102, "timestamp": "2024-01-02T11:00:00Z", "content": "thanks for the help", "channel_name": "general"},
                {"author": {"id": "103"}, "timestamp": "2024-01-02T12:00:00Z", "content": "hello", "channel_name": "welcome"},
                {"user_id": "101", "timestamp": "garbage", "content": "lost", "channel_name": "general"}
            ],
            "members": [
                {"user_id": "101", "username": "alice", "joined_at": "2024-01-01T08:00:00Z", "last_active": "2024-01-02T10:00:00Z", "is_active": true},
                {"user_id": "102", "username": "bob", "joined_at": "2023-06-01T08:00:00Z", "last_active": "2024-01-02T11:00:00Z", "is_active": true},
                {"user_id": "104", "username": "carol"}
            ],
            "voice_activity": [
                {"user_id": "101", "channel_name": "lounge", "joined_at": "2024-01-02T20:00:00Z", "left_at": "2024-01-02T20:30:00Z"}
            ]
        }"#
    }

    fn request_json() -> &'static str {
        r#"{"start": "2024-01-01", "end": "2024-01-02", "now": "2024-01-03T00:00:00Z"}"#
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
        )
    }

    fn sample_records() -> CommunityRecords {
        RecordAdapter::to_canonical(&RecordAdapter::parse_bundle(sample_bundle_json()).unwrap())
    }

    #[test]
    fn test_full_pass() {
        let metrics = analyze(
            &sample_records(),
            &request(),
            &LexiconScorer,
            &AnalyticsConfig::default(),
        )
        .unwrap();

        assert_eq!(metrics.activity.total_messages, 3);
        assert_eq!(metrics.activity.total_members, 3);
        assert_eq!(metrics.diagnostics.messages_without_timestamp, 1);
        assert_eq!(metrics.sentiment.sentiment_status, SentimentStatus::Positive);
        assert_eq!(metrics.growth.total_new_members, 1);
        assert_eq!(metrics.channels, vec!["all", "general", "welcome"]);
        assert_eq!(metrics.voice.total_sessions, 1);

        let general: Vec<Option<u64>> = metrics
            .channel_activity_series
            .iter()
            .map(|p| p.count("general"))
            .collect();
        assert_eq!(general, vec![Some(1), Some(2)]);

        let orbits: Vec<Orbit> = metrics.orbits.user_activity.iter().map(|u| u.orbit).collect();
        assert_eq!(orbits, vec![Orbit::Member, Orbit::Member, Orbit::Visitor]);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let records = sample_records();
        let config = AnalyticsConfig::default();
        let first = analyze(&records, &request(), &LexiconScorer, &config).unwrap();
        let second = analyze(&records, &request(), &LexiconScorer, &config).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_empty_records() {
        let metrics = analyze(
            &CommunityRecords::default(),
            &request(),
            &LexiconScorer,
            &AnalyticsConfig::default(),
        )
        .unwrap();

        assert_eq!(metrics.sentiment.average_score, 0.0);
        assert_eq!(metrics.sentiment.sentiment_status, SentimentStatus::Neutral);
        assert_eq!(metrics.growth.retention_rate, 0.0);
        assert_eq!(metrics.orbits.orbit_trends.total(), 0);
        assert_eq!(metrics.channel_activity_series.len(), 2);
        assert_eq!(metrics.activity.engagement_rate, 0.0);
    }

    #[test]
    fn test_channel_restriction() {
        let request = request().with_channel(ChannelFilter::Named("welcome".to_string()));
        let metrics = analyze(
            &sample_records(),
            &request,
            &LexiconScorer,
            &AnalyticsConfig::default(),
        )
        .unwrap();

        assert_eq!(metrics.activity.total_messages, 1);
        assert_eq!(metrics.channel_activity_series[1].count("welcome"), Some(1));
        assert_eq!(metrics.channel_activity_series[1].count("general"), None);
        // the selector list always covers the whole snapshot
        assert_eq!(metrics.channels.len(), 3);
    }

    #[test]
    fn test_inverted_range_is_error() {
        let request = AnalysisRequest::new(
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap(),
        );
        let result = analyze(
            &sample_records(),
            &request,
            &LexiconScorer,
            &AnalyticsConfig::default(),
        );
        assert!(matches!(result, Err(AnalyticsError::InvalidRange(_))));
    }

    #[test]
    fn test_failing_scorer_never_aborts() {
        let scorer = |_: &str| -> Result<f64, ScoreError> { Err(ScoreError::Rejected("offline".to_string())) };
        let metrics = analyze(&sample_records(), &request(), &scorer, &AnalyticsConfig::default()).unwrap();

        assert_eq!(metrics.sentiment.average_score, 0.0);
        assert_eq!(metrics.diagnostics.sentiment_failures, 3);
    }

    #[test]
    fn test_records_to_report() {
        let json = records_to_report(sample_bundle_json().to_string(), request_json().to_string()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["producer"]["name"], "community-pulse");
        assert_eq!(report["evaluated_at"], "2024-01-03T00:00:00Z");
        assert_eq!(report["metrics"]["orbits"]["orbit_trends"]["Visitor"], 1);
        assert_eq!(report["metrics"]["channel_activity_series"][1]["general"], 2);
    }

    #[test]
    fn test_invalid_json() {
        assert!(records_to_report("not valid json".to_string(), request_json().to_string()).is_err());
        assert!(records_to_report("{}".to_string(), "{}".to_string()).is_err());
    }

    #[test]
    fn test_processor_memoizes_per_request() {
        let mut processor = PulseProcessor::new();
        processor.load_records(sample_bundle_json()).unwrap();

        let first = processor.analyze(&request()).unwrap();
        let second = processor.analyze(&request()).unwrap();
        assert_eq!(first, second);
        assert_eq!(processor.cache_len(), 1);

        let welcome = request().with_channel(ChannelFilter::Named("welcome".to_string()));
        processor.analyze(&welcome).unwrap();
        assert_eq!(processor.cache_len(), 2);

        processor.clear_cache();
        assert_eq!(processor.cache_len(), 0);
    }

    fn request_at(minute: i64) -> AnalysisRequest {
        AnalysisRequest {
            now: request().now + chrono::Duration::minutes(minute),
            ..request()
        }
    }

    #[test]
    fn test_processor_cache_is_bounded() {
        let mut processor = PulseProcessor::new();
        processor.load_records(sample_bundle_json()).unwrap();

        for minute in 0..1000 {
            processor.analyze(&request_at(minute)).unwrap();
        }
        assert_eq!(processor.cache_len(), DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_processor_evicts_least_recently_used() {
        let mut processor = PulseProcessor::new().with_cache_capacity(2);
        processor.load_records(sample_bundle_json()).unwrap();

        processor.analyze(&request_at(0)).unwrap();
        processor.analyze(&request_at(1)).unwrap();
        // Touch the oldest entry so the second one is evicted next
        processor.analyze(&request_at(0)).unwrap();
        processor.analyze(&request_at(2)).unwrap();

        assert_eq!(processor.cache_len(), 2);
        let cached: Vec<AnalysisRequest> = processor.cache.iter().map(|(key, _)| key.clone()).collect();
        assert_eq!(cached, vec![request_at(0), request_at(2)]);

        let mut processor = processor.with_cache_capacity(1);
        assert_eq!(processor.cache_len(), 1);
        assert_eq!(processor.cache[0].0, request_at(2));

        processor = processor.with_cache_capacity(0);
        processor.analyze(&request()).unwrap();
        assert_eq!(processor.cache_len(), 0);
    }

    #[test]
    fn test_oversized_config_rejected_before_analysis() {
        let mut config = AnalyticsConfig::default();
        config.orbit.member_recency_days = i64::MAX;
        let result = analyze(&sample_records(), &request(), &LexiconScorer, &config);
        assert!(matches!(result, Err(AnalyticsError::InvalidConfig(_))));
    }

    #[test]
    fn test_processor_reload_drops_cache() {
        let mut processor = PulseProcessor::new();
        processor.load_records(sample_bundle_json()).unwrap();
        processor.analyze(&request()).unwrap();

        processor.load_records("{}").unwrap();
        assert_eq!(processor.cache_len(), 0);
        assert_eq!(processor.analyze(&request()).unwrap().activity.total_messages, 0);
    }

    #[test]
    fn test_processor_process_json() {
        let mut processor = PulseProcessor::new().with_instance_id("fixed".to_string());
        processor.load_records(sample_bundle_json()).unwrap();

        let json = processor.process(request_json()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["producer"]["instance_id"], "fixed");
        assert_eq!(report["metrics"]["activity"]["total_messages"], 3);

        let typed = processor.report(&request()).unwrap();
        assert_eq!(typed.producer.instance_id, "fixed");
        assert_eq!(typed.evaluated_at, request().now);
        assert_eq!(processor.cache_len(), 1);
    }

    #[test]
    fn test_processor_rejects_invalid_config() {
        let mut config = AnalyticsConfig::default();
        config.max_window_days = 0;
        assert!(matches!(
            PulseProcessor::with_config(config),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }
}
