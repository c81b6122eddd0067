//! Headline counters, channel options and voice activity
//!
//! These are the dashboard figures that sit next to the charts: how many
//! members there are, how many spoke recently, how message volume moved against
//! the previous period, and what happened in voice channels.

use crate::filter::DateWindow;
use crate::series::channel_names;
use crate::types::{
    ActivitySummary, Member, Message, UserId, VoiceActivity, VoiceSummary, ALL_CHANNELS,
};
use chrono::Duration;
use std::collections::HashSet;

/// Compute the activity counters.
///
/// `filtered` is the window- and channel-filtered message set; `all_messages`
/// is the unfiltered snapshot, used only for the previous-period count.
pub fn summarize_activity(
    members: &[Member],
    all_messages: &[Message],
    filtered: &[Message],
    window: &DateWindow,
    active_window_days: i64,
) -> ActivitySummary {
    let end = window.end_instant();
    let recent_cutoff = end - Duration::days(active_window_days);
    let previous_cutoff = recent_cutoff - Duration::days(active_window_days);

    let total_members = members.iter().map(|m| &m.user_id).collect::<HashSet<_>>().len() as u64;

    let recent: Vec<&Message> = filtered
        .iter()
        .filter(|m| m.timestamp.is_some_and(|t| t >= recent_cutoff))
        .collect();
    let active_members = distinct_authors(recent.iter().copied());
    let active_members_in_range = distinct_authors(filtered.iter());

    let new_messages = recent.len() as u64;
    let previous_period_messages = all_messages
        .iter()
        .filter(|m| m.timestamp.is_some_and(|t| previous_cutoff <= t && t < recent_cutoff))
        .count() as u64;

    let summary = ActivitySummary {
        total_members,
        active_members,
        active_members_in_range,
        total_messages: filtered.len() as u64,
        new_messages,
        previous_period_messages,
        message_growth_pct: percent_change(previous_period_messages, new_messages),
        engagement_rate: percentage(active_members_in_range, total_members),
    };

    tracing::debug!(
        total_members,
        active_members,
        new_messages,
        previous_period_messages,
        "summarized activity"
    );

    summary
}

/// Channel selector options: `"all"` first, then every channel in the snapshot
pub fn channel_options(messages: &[Message]) -> Vec<String> {
    std::iter::once(ALL_CHANNELS.to_string())
        .chain(channel_names(messages))
        .collect()
}

/// Summarize voice sessions that started inside the window.
///
/// Returns the summary and the number of sessions skipped for lacking a start.
pub fn summarize_voice(
    sessions: &[VoiceActivity],
    window: &DateWindow,
    recent_limit: usize,
) -> (VoiceSummary, u64) {
    let mut without_start = 0;
    let mut in_window: Vec<&VoiceActivity> = Vec::new();

    for session in sessions {
        match session.joined_at {
            Some(joined) if window.contains(joined) => in_window.push(session),
            Some(_) => {}
            None => without_start += 1,
        }
    }

    let ongoing_sessions = in_window.iter().filter(|s| s.is_ongoing()).count() as u64;
    let completed_minutes: f64 = in_window.iter().filter_map(|s| s.duration_minutes()).sum();
    let participants = in_window
        .iter()
        .map(|s| &s.user_id)
        .collect::<HashSet<&UserId>>()
        .len() as u64;

    let mut recent_sessions: Vec<VoiceActivity> = in_window.iter().map(|s| (*s).clone()).collect();
    recent_sessions.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
    recent_sessions.truncate(recent_limit);

    let summary = VoiceSummary {
        total_sessions: in_window.len() as u64,
        ongoing_sessions,
        completed_minutes,
        participants,
        recent_sessions,
    };

    (summary, without_start)
}

fn distinct_authors<'a>(messages: impl Iterator<Item = &'a Message>) -> u64 {
    messages.map(|m| &m.user_id).collect::<HashSet<_>>().len() as u64
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn percent_change(previous: u64, current: u64) -> f64 {
    if previous == 0 {
        0.0
    } else {
        (current as f64 - previous as f64) / previous as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, h, 0, 0).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            0,
            180,
        )
        .unwrap()
    }

    fn message(user: &str, ts: DateTime<Utc>, channel: &str) -> Message {
        Message {
            id: None,
            user_id: UserId::new(user).unwrap(),
            timestamp: Some(ts),
            content: None,
            channel_id: None,
            channel_name: channel.to_string(),
        }
    }

    fn member(user: &str) -> Member {
        Member {
            user_id: UserId::new(user).unwrap(),
            username: user.to_string(),
            joined_at: None,
            left_at: None,
            last_active: None,
            is_active: true,
        }
    }

    fn session(user: &str, joined: Option<DateTime<Utc>>, left: Option<DateTime<Utc>>) -> VoiceActivity {
        VoiceActivity {
            user_id: UserId::new(user).unwrap(),
            channel_name: "lounge".to_string(),
            joined_at: joined,
            left_at: left,
        }
    }

    #[test]
    fn test_activity_counters() {
        let members = vec![member("a"), member("b"), member("c"), member("d")];
        let messages = vec![
            // previous period: [Jan 17 23:59:59.999, Jan 24 23:59:59.999)
            message("a", at(1, 20, 9), "general"),
            message("b", at(1, 22, 9), "general"),
            // recent period
            message("a", at(1, 28, 9), "general"),
            message("a", at(1, 29, 9), "general"),
            message("c", at(1, 30, 9), "dev"),
            // early in the window
            message("d", at(1, 2, 9), "general"),
        ];

        let summary = summarize_activity(&members, &messages, &messages, &window(), 7);

        assert_eq!(summary.total_members, 4);
        assert_eq!(summary.total_messages, 6);
        assert_eq!(summary.new_messages, 3);
        assert_eq!(summary.active_members, 2);
        assert_eq!(summary.active_members_in_range, 4);
        assert_eq!(summary.previous_period_messages, 2);
        assert!((summary.message_growth_pct - 50.0).abs() < 1e-9);
        assert!((summary.engagement_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_previous_period_ignores_channel_filter() {
        let all = vec![
            message("a", at(1, 20, 9), "dev"),
            message("a", at(1, 28, 9), "general"),
        ];
        let filtered: Vec<Message> = all.iter().filter(|m| m.channel_name == "general").cloned().collect();

        let summary = summarize_activity(&[member("a")], &all, &filtered, &window(), 7);
        assert_eq!(summary.previous_period_messages, 1);
        assert_eq!(summary.new_messages, 1);
        assert_eq!(summary.message_growth_pct, 0.0);
    }

    #[test]
    fn test_empty_activity_has_no_nan() {
        let summary = summarize_activity(&[], &[], &[], &window(), 7);
        assert_eq!(summary, ActivitySummary::default());
        assert!(!summary.engagement_rate.is_nan());
    }

    #[test]
    fn test_channel_options() {
        let messages = vec![
            message("a", at(1, 2, 9), "general"),
            message("a", at(1, 3, 9), "dev"),
            message("a", at(1, 4, 9), "general"),
            message("a", at(1, 4, 10), "all"),
            message("a", at(1, 4, 11), "date"),
        ];
        assert_eq!(channel_options(&messages), vec!["all", "general", "dev"]);
        assert_eq!(channel_options(&[]), vec!["all"]);
    }

    #[test]
    fn test_voice_summary() {
        let sessions = vec![
            session("a", Some(at(1, 10, 20)), Some(at(1, 10, 21))),
            session("b", Some(at(1, 12, 20)), None),
            session("a", Some(at(1, 11, 20)), Some(at(1, 11, 20) + Duration::minutes(30))),
            session("c", Some(at(2, 5, 20)), None),
            session("d", None, None),
        ];

        let (summary, without_start) = summarize_voice(&sessions, &window(), 2);

        assert_eq!(without_start, 1);
        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.ongoing_sessions, 1);
        assert_eq!(summary.participants, 2);
        assert!((summary.completed_minutes - 90.0).abs() < 1e-9);

        let recent: Vec<_> = summary.recent_sessions.iter().map(|s| s.joined_at).collect();
        assert_eq!(recent, vec![Some(at(1, 12, 20)), Some(at(1, 11, 20))]);
    }
}
