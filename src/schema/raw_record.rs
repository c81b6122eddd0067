//! Raw record schema
//!
//! Mirrors what the retrieval collaborators hand over: chat messages straight from
//! the platform API (channel fields attached by the fetcher) and member / voice
//! rows from the backing store. Fields are deliberately loose; the adapter
//! decides what is usable.

use super::timestamp::RawTimestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A user id as a source encoded it: platform snowflakes may arrive as JSON
/// numbers from one source and strings from another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawUserId {
    Integer(u64),
    Signed(i64),
    Text(String),
    /// Floats, booleans, objects; never usable as an id
    Other(serde_json::Value),
}

impl RawUserId {
    /// Text form before trimming, or `None` for non-scalar values
    pub fn to_text(&self) -> Option<String> {
        match self {
            RawUserId::Integer(n) => Some(n.to_string()),
            RawUserId::Signed(n) => Some(n.to_string()),
            RawUserId::Text(s) => Some(s.clone()),
            RawUserId::Other(_) => None,
        }
    }
}

/// Deserialize an optional field, treating a value of the wrong type as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Deserialize a record list; entries that are not objects become empty
/// records so they keep their index and fail validation downstream
fn lenient_records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or_default())
        .collect())
}

/// Message author block as the chat platform nests it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub id: Option<RawUserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub global_name: Option<String>,
}

/// A chat message record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub id: Option<RawUserId>,
    /// Flat author id; preferred over `author.id` when both exist
    #[serde(default)]
    pub user_id: Option<RawUserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<RawAuthor>,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    /// Usually a string; anything else is treated as non-text
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    #[serde(default)]
    pub channel_id: Option<RawUserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub channel_name: Option<String>,
}

/// A member row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    #[serde(default)]
    pub user_id: Option<RawUserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(default)]
    pub joined_at: Option<RawTimestamp>,
    #[serde(default)]
    pub left_at: Option<RawTimestamp>,
    #[serde(default)]
    pub last_active: Option<RawTimestamp>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_active: Option<bool>,
}

/// A voice session row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVoiceActivity {
    #[serde(default)]
    pub user_id: Option<RawUserId>,
    #[serde(default, deserialize_with = "lenient")]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub joined_at: Option<RawTimestamp>,
    #[serde(default)]
    pub left_at: Option<RawTimestamp>,
}

/// Everything one retrieval round produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBundle {
    #[serde(default, deserialize_with = "lenient_records")]
    pub messages: Vec<RawMessage>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub members: Vec<RawMember>,
    #[serde(default, alias = "voice", deserialize_with = "lenient_records")]
    pub voice_activity: Vec<RawVoiceActivity>,
}

/// Which collection a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Message,
    Member,
    VoiceActivity,
}

/// A problem with a single raw record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIssue {
    pub kind: RecordKind,
    /// Position in its collection
    pub index: usize,
    pub field: String,
    pub problem: String,
}

impl std::fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} #{} field '{}': {}",
            self.kind, self.index, self.field, self.problem
        )
    }
}
