//! Core types for the Community Pulse engine
//!
//! This module defines the canonical records every stage consumes, the request
//! that scopes an analysis pass, and the derived metrics a pass produces.

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Channel name substituted when a message carries none
pub const UNKNOWN_CHANNEL: &str = "unknown";

/// Channel selector meaning "no channel restriction"
pub const ALL_CHANNELS: &str = "all";

/// Key holding the day in a flattened series point
pub const SERIES_DATE_KEY: &str = "date";

/// Canonical user identifier.
///
/// Chat platforms hand out numeric snowflakes while the member store keeps
/// strings; both are normalized to one trimmed string so joins never depend on
/// how a source encoded the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Build an id from raw text. Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Platform message id, if the source provided one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Author
    pub user_id: UserId,
    /// Send time; `None` when the source timestamp could not be parsed
    pub timestamp: Option<DateTime<Utc>>,
    /// Text body; `None` for empty or non-text content
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub channel_name: String,
}

/// A community member as recorded by the member store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    /// Display name (falls back to the user id)
    pub username: String,
    pub joined_at: Option<DateTime<Utc>>,
    /// `None` while the user is still a member
    pub left_at: Option<DateTime<Utc>>,
    /// `None` means never active
    pub last_active: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// A voice channel session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceActivity {
    pub user_id: UserId,
    pub channel_name: String,
    pub joined_at: Option<DateTime<Utc>>,
    /// `None` while the session is ongoing
    pub left_at: Option<DateTime<Utc>>,
}

impl VoiceActivity {
    pub fn is_ongoing(&self) -> bool {
        self.left_at.is_none()
    }

    /// Length of a completed session in minutes
    pub fn duration_minutes(&self) -> Option<f64> {
        match (self.joined_at, self.left_at) {
            (Some(joined), Some(left)) if left >= joined => {
                Some((left - joined).num_milliseconds() as f64 / 60_000.0)
            }
            _ => None,
        }
    }
}

/// One snapshot of everything the engine analyzes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecords {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub voice_activity: Vec<VoiceActivity>,
}

/// Channel restriction for an analysis pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChannelFilter {
    #[default]
    All,
    Named(String),
}

impl ChannelFilter {
    pub fn matches(&self, channel_name: &str) -> bool {
        match self {
            ChannelFilter::All => true,
            ChannelFilter::Named(name) => name == channel_name,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChannelFilter::All => ALL_CHANNELS,
            ChannelFilter::Named(name) => name.as_str(),
        }
    }
}

impl From<String> for ChannelFilter {
    fn from(selector: String) -> Self {
        if selector == ALL_CHANNELS {
            ChannelFilter::All
        } else {
            ChannelFilter::Named(selector)
        }
    }
}

impl From<ChannelFilter> for String {
    fn from(filter: ChannelFilter) -> Self {
        match filter {
            ChannelFilter::All => ALL_CHANNELS.to_string(),
            ChannelFilter::Named(name) => name,
        }
    }
}

impl FromStr for ChannelFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ChannelFilter::from(s.to_string()))
    }
}

impl fmt::Display for ChannelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one analysis pass.
///
/// `now` is always supplied by the caller; the engine never reads the clock, so
/// the same request over the same records always yields the same metrics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// First calendar day of the window (inclusive)
    pub start: NaiveDate,
    /// Last calendar day of the window (inclusive)
    pub end: NaiveDate,
    #[serde(default)]
    pub channel: ChannelFilter,
    /// Evaluation instant for recency rules
    pub now: DateTime<Utc>,
    /// Offset of the calendar used for day bucketing, in minutes east of UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl AnalysisRequest {
    pub fn new(start: NaiveDate, end: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            channel: ChannelFilter::All,
            now,
            utc_offset_minutes: 0,
        }
    }

    pub fn with_channel(mut self, channel: ChannelFilter) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }
}

/// Coarse sentiment classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SentimentStatus {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// Engagement tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orbit {
    Visitor,
    Member,
    Contributor,
    Ambassador,
}

impl Orbit {
    /// Tiers from the innermost orbit outwards
    pub const ALL: [Orbit; 4] = [
        Orbit::Ambassador,
        Orbit::Contributor,
        Orbit::Member,
        Orbit::Visitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Orbit::Visitor => "Visitor",
            Orbit::Member => "Member",
            Orbit::Contributor => "Contributor",
            Orbit::Ambassador => "Ambassador",
        }
    }
}

impl fmt::Display for Orbit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orbit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visitor" => Ok(Orbit::Visitor),
            "member" => Ok(Orbit::Member),
            "contributor" => Ok(Orbit::Contributor),
            "ambassador" => Ok(Orbit::Ambassador),
            other => Err(format!("unknown orbit '{other}'")),
        }
    }
}

/// Orbit assignment for one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrbit {
    pub user_id: UserId,
    pub username: String,
    pub message_count: u64,
    pub last_active: Option<DateTime<Utc>>,
    pub orbit: Orbit,
}

/// Member count per tier; every tier is always present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrbitTrends {
    pub ambassador: u64,
    pub contributor: u64,
    pub member: u64,
    pub visitor: u64,
}

impl OrbitTrends {
    pub fn get(&self, orbit: Orbit) -> u64 {
        match orbit {
            Orbit::Ambassador => self.ambassador,
            Orbit::Contributor => self.contributor,
            Orbit::Member => self.member,
            Orbit::Visitor => self.visitor,
        }
    }

    pub fn record(&mut self, orbit: Orbit) {
        match orbit {
            Orbit::Ambassador => self.ambassador += 1,
            Orbit::Contributor => self.contributor += 1,
            Orbit::Member => self.member += 1,
            Orbit::Visitor => self.visitor += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.ambassador + self.contributor + self.member + self.visitor
    }
}

/// Output of the orbit classifier
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrbitReport {
    /// One entry per member, in member order
    pub user_activity: Vec<UserOrbit>,
    pub orbit_trends: OrbitTrends,
    pub top_ambassadors: Vec<UserOrbit>,
}

impl OrbitReport {
    /// Members of one tier, most recently active first.
    ///
    /// Never-active members sort last; ties keep member order.
    pub fn users_in_role(&self, role: Orbit) -> Vec<UserOrbit> {
        let mut users: Vec<UserOrbit> = self
            .user_activity
            .iter()
            .filter(|u| u.orbit == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        users
    }
}

/// Aggregate sentiment over the filtered messages
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub average_score: f64,
    pub sentiment_status: SentimentStatus,
    /// Messages with text that reached the scorer
    pub scored_messages: u64,
    /// Messages whose scoring failed and counted as neutral
    pub failed_messages: u64,
}

/// Joins and leaves on one calendar day (not cumulative)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub new_members: u64,
    pub churned_members: u64,
}

/// Output of the growth & retention calculator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GrowthMetrics {
    pub total_new_members: u64,
    pub total_churned_members: u64,
    pub net_growth: i64,
    /// Percentage in `[0, 100]`
    pub retention_rate: f64,
    pub retention_candidates: u64,
    pub retained_members: u64,
    pub growth_series: Vec<GrowthPoint>,
}

/// Running message total for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCount {
    pub channel: String,
    pub cumulative: u64,
}

/// One day of the cumulative channel activity chart.
///
/// Serializes flat, the shape chart libraries expect:
/// `{"date": "2024-01-15", "general": 12, "welcome": 3}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelActivityPoint {
    pub date: NaiveDate,
    pub channels: Vec<ChannelCount>,
}

impl ChannelActivityPoint {
    /// Cumulative count for a channel on this day
    pub fn count(&self, channel: &str) -> Option<u64> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| c.cumulative)
    }
}

impl Serialize for ChannelActivityPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.channels.len() + 1))?;
        map.serialize_entry(SERIES_DATE_KEY, &self.date)?;
        for entry in &self.channels {
            map.serialize_entry(&entry.channel, &entry.cumulative)?;
        }
        map.end()
    }
}

/// Headline activity counters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivitySummary {
    /// Distinct member ids
    pub total_members: u64,
    /// Distinct authors in the trailing active window
    pub active_members: u64,
    /// Distinct authors anywhere in the window
    pub active_members_in_range: u64,
    pub total_messages: u64,
    /// Filtered messages in the trailing active window
    pub new_messages: u64,
    /// All messages in the period before the trailing active window
    pub previous_period_messages: u64,
    pub message_growth_pct: f64,
    pub engagement_rate: f64,
}

/// Voice sessions that started inside the window
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VoiceSummary {
    pub total_sessions: u64,
    pub ongoing_sessions: u64,
    pub completed_minutes: f64,
    pub participants: u64,
    /// Newest first
    pub recent_sessions: Vec<VoiceActivity>,
}

/// Non-fatal anomalies observed during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Messages excluded because their timestamp was missing or unparsable
    pub messages_without_timestamp: u64,
    /// Voice sessions excluded because their start was missing or unparsable
    pub voice_sessions_without_start: u64,
    pub sentiment_failures: u64,
}

/// The resolved window a pass ran over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    /// Effective end after the window cap
    pub end: NaiveDate,
    pub requested_end: NaiveDate,
    pub clamped: bool,
    pub channel: ChannelFilter,
    pub utc_offset_minutes: i32,
    pub evaluated_at: DateTime<Utc>,
}

/// Everything one analysis pass derives
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub window: AnalysisWindow,
    pub activity: ActivitySummary,
    pub growth: GrowthMetrics,
    pub sentiment: SentimentSummary,
    pub orbits: OrbitReport,
    pub channel_activity_series: Vec<ChannelActivityPoint>,
    /// Channel selector options: `"all"` followed by every channel seen
    pub channels: Vec<String>,
    pub voice: VoiceSummary,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_user_id_trims_and_rejects_blank() {
        assert_eq!(UserId::new("  42 ").unwrap().as_str(), "42");
        assert!(UserId::new("   ").is_none());
    }

    #[test]
    fn test_channel_filter_sentinel() {
        assert_eq!("all".parse::<ChannelFilter>().unwrap(), ChannelFilter::All);
        let general: ChannelFilter = "general".parse().unwrap();
        assert!(general.matches("general"));
        assert!(!general.matches("welcome"));
        assert!(ChannelFilter::All.matches("anything"));
    }

    #[test]
    fn test_channel_filter_serializes_as_string() {
        let json = serde_json::to_string(&ChannelFilter::Named("dev".to_string())).unwrap();
        assert_eq!(json, "\"dev\"");
        let all: ChannelFilter = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, ChannelFilter::All);
    }

    #[test]
    fn test_orbit_parse_case_insensitive() {
        assert_eq!("Ambassador".parse::<Orbit>().unwrap(), Orbit::Ambassador);
        assert_eq!(" visitor ".parse::<Orbit>().unwrap(), Orbit::Visitor);
        assert!("satellite".parse::<Orbit>().is_err());
    }

    #[test]
    fn test_orbit_trends_serialize_all_tiers() {
        let value = serde_json::to_value(OrbitTrends::default()).unwrap();
        for tier in ["Ambassador", "Contributor", "Member", "Visitor"] {
            assert_eq!(value[tier], 0);
        }
    }

    #[test]
    fn test_channel_point_serializes_flat() {
        let point = ChannelActivityPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            channels: vec![
                ChannelCount {
                    channel: "general".to_string(),
                    cumulative: 3,
                },
                ChannelCount {
                    channel: "welcome".to_string(),
                    cumulative: 1,
                },
            ],
        };
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["date"], "2024-01-15");
        assert_eq!(value["general"], 3);
        assert_eq!(value["welcome"], 1);
        assert_eq!(point.count("general"), Some(3));
        assert_eq!(point.count("random"), None);
    }

    #[test]
    fn test_growth_point_camel_case() {
        let point = GrowthPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            new_members: 2,
            churned_members: 1,
        };
        let value = serde_json::to_value(point).unwrap();
        assert_eq!(value["newMembers"], 2);
        assert_eq!(value["churnedMembers"], 1);
    }

    #[test]
    fn test_voice_duration() {
        let session = VoiceActivity {
            user_id: UserId::new("u1").unwrap(),
            channel_name: "lounge".to_string(),
            joined_at: Some(Utc.with_ymd_and_hms(2024, 1, 15, 20, 0, 0).unwrap()),
            left_at: Some(Utc.with_ymd_and_hms(2024, 1, 15, 20, 45, 0).unwrap()),
        };
        assert!(!session.is_ongoing());
        assert_eq!(session.duration_minutes(), Some(45.0));
    }
}
