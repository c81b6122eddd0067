//! Adapter for converting raw record bundles to canonical community records
//!
//! This is the only place ids, timestamps and optional fields are interpreted.
//! Everything downstream sees `UserId`, `Option<DateTime<Utc>>` and explicit
//! defaults.

use super::raw_record::*;
use super::timestamp::RawTimestamp;
use crate::error::AnalyticsError;
use crate::types::{CommunityRecords, Member, Message, UserId, VoiceActivity, UNKNOWN_CHANNEL};
use chrono::{DateTime, Utc};

/// Adapter for converting raw records to canonical records
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse a JSON object with `messages`, `members` and `voice_activity` arrays
    pub fn parse_bundle(json: &str) -> Result<RecordBundle, AnalyticsError> {
        serde_json::from_str(json)
            .map_err(|e| AnalyticsError::ParseError(format!("Failed to parse record bundle: {}", e)))
    }

    /// Convert raw records to canonical records.
    ///
    /// Records without a usable user id are dropped (there is nothing to join
    /// them on). Everything else is kept, with unparsable timestamps as `None`.
    pub fn to_canonical(bundle: &RecordBundle) -> CommunityRecords {
        let messages: Vec<Message> = bundle
            .messages
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let message = canonical_message(raw);
                if message.is_none() {
                    tracing::warn!(index, "dropping message without a user id");
                }
                message
            })
            .collect();

        let members: Vec<Member> = bundle
            .members
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let member = canonical_member(raw);
                if member.is_none() {
                    tracing::warn!(index, "dropping member without a user id");
                }
                member
            })
            .collect();

        let voice_activity: Vec<VoiceActivity> = bundle
            .voice_activity
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let session = canonical_voice(raw);
                if session.is_none() {
                    tracing::warn!(index, "dropping voice session without a user id");
                }
                session
            })
            .collect();

        tracing::debug!(
            messages = messages.len(),
            members = members.len(),
            voice_sessions = voice_activity.len(),
            "normalized record bundle"
        );

        CommunityRecords {
            messages,
            members,
            voice_activity,
        }
    }

    /// List every record with a missing id or an unparsable timestamp
    pub fn validate(bundle: &RecordBundle) -> Vec<RecordIssue> {
        let mut issues = Vec::new();

        for (index, raw) in bundle.messages.iter().enumerate() {
            let id = raw
                .user_id
                .as_ref()
                .filter(|id| to_user_id(id).is_some())
                .or_else(|| raw.author.as_ref().and_then(|a| a.id.as_ref()))
                .or(raw.user_id.as_ref());
            check_id(&mut issues, RecordKind::Message, index, "user_id", id);
            check_required_time(&mut issues, RecordKind::Message, index, "timestamp", raw.timestamp.as_ref());
        }

        for (index, raw) in bundle.members.iter().enumerate() {
            let kind = RecordKind::Member;
            check_id(&mut issues, kind, index, "user_id", raw.user_id.as_ref());
            check_optional_time(&mut issues, kind, index, "joined_at", raw.joined_at.as_ref());
            check_optional_time(&mut issues, kind, index, "left_at", raw.left_at.as_ref());
            check_optional_time(&mut issues, kind, index, "last_active", raw.last_active.as_ref());
        }

        for (index, raw) in bundle.voice_activity.iter().enumerate() {
            let kind = RecordKind::VoiceActivity;
            check_id(&mut issues, kind, index, "user_id", raw.user_id.as_ref());
            check_required_time(&mut issues, kind, index, "joined_at", raw.joined_at.as_ref());
            check_optional_time(&mut issues, kind, index, "left_at", raw.left_at.as_ref());
        }

        issues
    }
}

fn canonical_message(raw: &RawMessage) -> Option<Message> {
    let user_id = raw
        .user_id
        .as_ref()
        .and_then(to_user_id)
        .or_else(|| {
            raw.author
                .as_ref()
                .and_then(|author| author.id.as_ref())
                .and_then(to_user_id)
        })?;

    let content = match &raw.content {
        Some(serde_json::Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    };

    Some(Message {
        id: raw.id.as_ref().and_then(RawUserId::to_text),
        user_id,
        timestamp: normalize(raw.timestamp.as_ref()),
        content,
        channel_id: raw.channel_id.as_ref().and_then(RawUserId::to_text),
        channel_name: channel_or_unknown(raw.channel_name.as_deref()),
    })
}

fn canonical_member(raw: &RawMember) -> Option<Member> {
    let user_id = raw.user_id.as_ref().and_then(to_user_id)?;

    let username = match raw.username.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => user_id.to_string(),
    };

    Some(Member {
        username,
        joined_at: normalize(raw.joined_at.as_ref()),
        left_at: normalize(raw.left_at.as_ref()),
        last_active: normalize(raw.last_active.as_ref()),
        is_active: raw.is_active.unwrap_or(false),
        user_id,
    })
}

fn canonical_voice(raw: &RawVoiceActivity) -> Option<VoiceActivity> {
    let user_id = raw.user_id.as_ref().and_then(to_user_id)?;

    Some(VoiceActivity {
        user_id,
        channel_name: channel_or_unknown(raw.channel_name.as_deref()),
        joined_at: normalize(raw.joined_at.as_ref()),
        left_at: normalize(raw.left_at.as_ref()),
    })
}

fn to_user_id(raw: &RawUserId) -> Option<UserId> {
    raw.to_text().and_then(|text| UserId::new(&text))
}

fn normalize(raw: Option<&RawTimestamp>) -> Option<DateTime<Utc>> {
    raw.and_then(RawTimestamp::normalize)
}

fn channel_or_unknown(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => UNKNOWN_CHANNEL.to_string(),
    }
}

fn check_id(
    issues: &mut Vec<RecordIssue>,
    kind: RecordKind,
    index: usize,
    field: &str,
    id: Option<&RawUserId>,
) {
    let problem = match id {
        None => "missing user id".to_string(),
        Some(raw) if to_user_id(raw).is_none() => format!("unusable user id {:?}", raw),
        Some(_) => return,
    };
    issues.push(RecordIssue {
        kind,
        index,
        field: field.to_string(),
        problem,
    });
}

fn check_required_time(
    issues: &mut Vec<RecordIssue>,
    kind: RecordKind,
    index: usize,
    field: &str,
    value: Option<&RawTimestamp>,
) {
    match value {
        None => issues.push(RecordIssue {
            kind,
            index,
            field: field.to_string(),
            problem: "missing timestamp".to_string(),
        }),
        Some(_) => check_optional_time(issues, kind, index, field, value),
    }
}

fn check_optional_time(
    issues: &mut Vec<RecordIssue>,
    kind: RecordKind,
    index: usize,
    field: &str,
    value: Option<&RawTimestamp>,
) {
    if let Some(raw) = value {
        if raw.normalize().is_none() {
            issues.push(RecordIssue {
                kind,
                index,
                field: field.to_string(),
                problem: format!("unparsable timestamp {:?}", raw),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_bundle_json() -> &'static str {
        r#"{
            "messages": [
                {"user_id": 101, "timestamp": "2024-01-15T10:00:00Z", "content": "great stuff", "channel_name": "general"},
                {"author": {"id": "102"}, "timestamp": 1705312800000, "content": "", "channel_id": 555},
                {"timestamp": "2024-01-15T10:00:00Z", "content": "orphan"},
                {"user_id": " 101 ", "timestamp": "not a date", "content": {"embed": true}, "channel_name": "general"}
            ],
            "members": [
                {"user_id": "101", "username": "alice", "joined_at": "2024-01-10 08:00:00+00", "is_active": true},
                {"user_id": 102, "username": "  ", "last_active": "1705312800000"},
                {"username": "ghost"}
            ],
            "voice_activity": [
                {"user_id": "101", "channel_name": "lounge", "joined_at": "2024-01-15T20:00:00Z"},
                {"user_id": "102", "joined_at": "soon"}
            ]
        }"#
    }

    #[test]
    fn test_parse_and_normalize() {
        let bundle = RecordAdapter::parse_bundle(sample_bundle_json()).unwrap();
        let records = RecordAdapter::to_canonical(&bundle);

        assert_eq!(records.messages.len(), 3);
        assert_eq!(records.members.len(), 2);
        assert_eq!(records.voice_activity.len(), 2);

        let first = &records.messages[0];
        assert_eq!(first.user_id.as_str(), "101");
        assert_eq!(
            first.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap())
        );
        assert_eq!(first.content.as_deref(), Some("great stuff"));
    }

    #[test]
    fn test_author_id_fallback_and_defaults() {
        let bundle = RecordAdapter::parse_bundle(sample_bundle_json()).unwrap();
        let records = RecordAdapter::to_canonical(&bundle);

        let second = &records.messages[1];
        assert_eq!(second.user_id.as_str(), "102");
        assert_eq!(second.channel_name, "unknown");
        assert_eq!(second.channel_id.as_deref(), Some("555"));
        assert!(second.content.is_none());
        assert_eq!(
            second.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unparsable_timestamp_kept_as_none() {
        let bundle = RecordAdapter::parse_bundle(sample_bundle_json()).unwrap();
        let records = RecordAdapter::to_canonical(&bundle);

        let third = &records.messages[2];
        assert_eq!(third.user_id.as_str(), "101");
        assert!(third.timestamp.is_none());
        assert!(third.content.is_none());
    }

    #[test]
    fn test_member_defaults() {
        let bundle = RecordAdapter::parse_bundle(sample_bundle_json()).unwrap();
        let records = RecordAdapter::to_canonical(&bundle);

        let alice = &records.members[0];
        assert_eq!(alice.username, "alice");
        assert!(alice.is_active);
        assert_eq!(
            alice.joined_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap())
        );
        assert!(alice.last_active.is_none());

        let bob = &records.members[1];
        assert_eq!(bob.username, "102");
        assert!(!bob.is_active);
        assert!(bob.last_active.is_some());
    }

    #[test]
    fn test_validate_reports_issues() {
        let bundle = RecordAdapter::parse_bundle(sample_bundle_json()).unwrap();
        let issues = RecordAdapter::validate(&bundle);

        let describe: Vec<(RecordKind, usize, &str)> = issues
            .iter()
            .map(|i| (i.kind, i.index, i.field.as_str()))
            .collect();

        assert!(describe.contains(&(RecordKind::Message, 2, "user_id")));
        assert!(describe.contains(&(RecordKind::Message, 3, "timestamp")));
        assert!(describe.contains(&(RecordKind::Member, 2, "user_id")));
        assert!(describe.contains(&(RecordKind::VoiceActivity, 1, "joined_at")));
        assert_eq!(issues.len(), 4);
    }

    #[test]
    fn test_wrongly_typed_fields_never_fail_the_bundle() {
        let json = r#"{
            "messages": [
                {"user_id": "101", "timestamp": "2024-01-15T10:00:00Z", "content": "kept", "channel_name": "general"},
                {"user_id": "102", "timestamp": true, "content": "no time", "channel_name": 7},
                {"user_id": 1.5, "timestamp": "2024-01-15T11:00:00Z", "content": "bad id"}
            ],
            "members": [
                {"user_id": "101", "joined_at": {"$date": 1705312800000}, "username": 5, "is_active": "yes"}
            ]
        }"#;

        let bundle = RecordAdapter::parse_bundle(json).unwrap();
        let records = RecordAdapter::to_canonical(&bundle);

        assert_eq!(records.messages.len(), 2);
        assert_eq!(records.messages[0].content.as_deref(), Some("kept"));
        assert_eq!(records.messages[1].user_id.as_str(), "102");
        assert!(records.messages[1].timestamp.is_none());
        assert_eq!(records.messages[1].channel_name, "unknown");

        let member = &records.members[0];
        assert!(member.joined_at.is_none());
        assert_eq!(member.username, "101");
        assert!(!member.is_active);

        let issues = RecordAdapter::validate(&bundle);
        let describe: Vec<(RecordKind, usize, &str)> = issues
            .iter()
            .map(|i| (i.kind, i.index, i.field.as_str()))
            .collect();
        assert_eq!(
            describe,
            vec![
                (RecordKind::Message, 1, "timestamp"),
                (RecordKind::Message, 2, "user_id"),
                (RecordKind::Member, 0, "joined_at"),
            ]
        );
        assert!(issues[1].problem.starts_with("unusable user id"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(RecordAdapter::parse_bundle("not json").is_err());
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = RecordAdapter::parse_bundle("{}").unwrap();
        let records = RecordAdapter::to_canonical(&bundle);
        assert_eq!(records, CommunityRecords::default());
        assert!(RecordAdapter::validate(&bundle).is_empty());
    }
}
