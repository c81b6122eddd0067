//! Member growth and retention
//!
//! Joins and leaves are bucketed by calendar date in the window's offset, so a
//! member who joined late in the evening is never counted on two days. The
//! growth series is per-day, not cumulative.

use crate::config::RetentionWindows;
use crate::filter::DateWindow;
use crate::types::{GrowthMetrics, GrowthPoint, Member};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

/// Compute join/leave tallies, net growth and retention for a window
pub fn compute_growth(
    members: &[Member],
    window: &DateWindow,
    retention: &RetentionWindows,
) -> GrowthMetrics {
    let days = window.days();
    let mut joins: HashMap<NaiveDate, u64> = HashMap::new();
    let mut leaves: HashMap<NaiveDate, u64> = HashMap::new();

    for member in members {
        if let Some(day) = member.joined_at.map(|t| window.local_date(t)) {
            if in_window(window, day) {
                *joins.entry(day).or_insert(0) += 1;
            }
        }
        if let Some(day) = member.left_at.map(|t| window.local_date(t)) {
            if in_window(window, day) {
                *leaves.entry(day).or_insert(0) += 1;
            }
        }
    }

    let growth_series: Vec<GrowthPoint> = days
        .iter()
        .map(|day| GrowthPoint {
            date: *day,
            new_members: joins.get(day).copied().unwrap_or(0),
            churned_members: leaves.get(day).copied().unwrap_or(0),
        })
        .collect();

    let total_new_members: u64 = growth_series.iter().map(|p| p.new_members).sum();
    let total_churned_members: u64 = growth_series.iter().map(|p| p.churned_members).sum();
    let net_growth = total_new_members as i64 - total_churned_members as i64;

    let (retention_candidates, retained_members) = retention_counts(members, window, retention);
    let retention_rate = retention_rate(retention_candidates, retained_members);

    tracing::debug!(
        total_new_members,
        total_churned_members,
        retention_candidates,
        retained_members,
        "computed growth metrics"
    );

    GrowthMetrics {
        total_new_members,
        total_churned_members,
        net_growth,
        retention_rate,
        retention_candidates,
        retained_members,
        growth_series,
    }
}

fn in_window(window: &DateWindow, day: NaiveDate) -> bool {
    window.start() <= day && day <= window.end()
}

/// Recently joined active members, and how many of them were active lately.
///
/// A member with no join date never qualifies; one with no activity date is
/// never retained.
fn retention_counts(
    members: &[Member],
    window: &DateWindow,
    retention: &RetentionWindows,
) -> (u64, u64) {
    let end = window.end_instant();
    let join_cutoff = end - Duration::days(retention.join_days);
    let activity_cutoff = end - Duration::days(retention.activity_days);

    let candidates: Vec<&Member> = members
        .iter()
        .filter(|m| m.is_active && m.joined_at.is_some_and(|t| t >= join_cutoff))
        .collect();

    let retained = candidates
        .iter()
        .filter(|m| m.last_active.is_some_and(|t| t >= activity_cutoff))
        .count();

    (candidates.len() as u64, retained as u64)
}

fn retention_rate(candidates: u64, retained: u64) -> f64 {
    if candidates == 0 {
        return 0.0;
    }
    (retained as f64 / candidates as f64 * 100.0).clamp(0.0, 100.0)
}
