//! Orbit classification
//!
//! Places each member in an engagement tier from how much they wrote in the
//! filtered window and how recently they were active. Tiers are checked from
//! the innermost orbit outwards; the first match wins.

use crate::config::OrbitThresholds;
use crate::types::{Member, Message, Orbit, OrbitReport, OrbitTrends, UserId, UserOrbit};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Recency cutoffs resolved against one evaluation instant
#[derive(Debug, Clone, Copy)]
struct Cutoffs {
    ambassador: DateTime<Utc>,
    contributor: DateTime<Utc>,
    member: DateTime<Utc>,
}

impl Cutoffs {
    fn new(now: DateTime<Utc>, thresholds: &OrbitThresholds) -> Self {
        Self {
            ambassador: now - Duration::days(thresholds.ambassador_recency_days),
            contributor: now - Duration::days(thresholds.contributor_recency_days),
            member: now - Duration::days(thresholds.member_recency_days),
        }
    }
}

/// Orbit classifier bound to a set of thresholds
pub struct OrbitClassifier<'a> {
    thresholds: &'a OrbitThresholds,
    top_ambassadors: usize,
}

impl<'a> OrbitClassifier<'a> {
    pub fn new(thresholds: &'a OrbitThresholds, top_ambassadors: usize) -> Self {
        Self {
            thresholds,
            top_ambassadors,
        }
    }

    /// Assign a tier from a message count and last activity, relative to `now`
    pub fn assign(
        &self,
        message_count: u64,
        last_active: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Orbit {
        assign_with(self.thresholds, &Cutoffs::new(now, self.thresholds), message_count, last_active)
    }

    /// Classify every member against the filtered messages
    pub fn classify(&self, members: &[Member], messages: &[Message], now: DateTime<Utc>) -> OrbitReport {
        let counts = count_messages(messages);
        let cutoffs = Cutoffs::new(now, self.thresholds);

        let user_activity: Vec<UserOrbit> = members
            .iter()
            .map(|member| {
                let message_count = counts.get(&member.user_id).copied().unwrap_or(0);
                UserOrbit {
                    user_id: member.user_id.clone(),
                    username: member.username.clone(),
                    message_count,
                    last_active: member.last_active,
                    orbit: assign_with(self.thresholds, &cutoffs, message_count, member.last_active),
                }
            })
            .collect();

        let mut orbit_trends = OrbitTrends::default();
        for user in &user_activity {
            orbit_trends.record(user.orbit);
        }

        let mut top_ambassadors: Vec<UserOrbit> = user_activity
            .iter()
            .filter(|u| u.orbit == Orbit::Ambassador)
            .cloned()
            .collect();
        // Stable sort keeps member order among equal counts
        top_ambassadors.sort_by(|a, b| b.message_count.cmp(&a.message_count));
        top_ambassadors.truncate(self.top_ambassadors);

        tracing::debug!(
            members = user_activity.len(),
            ambassadors = orbit_trends.ambassador,
            contributors = orbit_trends.contributor,
            regulars = orbit_trends.member,
            visitors = orbit_trends.visitor,
            "classified orbits"
        );

        OrbitReport {
            user_activity,
            orbit_trends,
            top_ambassadors,
        }
    }
}

fn assign_with(
    thresholds: &OrbitThresholds,
    cutoffs: &Cutoffs,
    message_count: u64,
    last_active: Option<DateTime<Utc>>,
) -> Orbit {
    let active_since = |cutoff: DateTime<Utc>| last_active.is_some_and(|t| t >= cutoff);

    if message_count >= thresholds.ambassador_min_messages && active_since(cutoffs.ambassador) {
        Orbit::Ambassador
    } else if message_count >= thresholds.contributor_min_messages && active_since(cutoffs.contributor) {
        Orbit::Contributor
    } else if message_count >= thresholds.member_min_messages && active_since(cutoffs.member) {
        Orbit::Member
    } else {
        Orbit::Visitor
    }
}

/// Messages per author in one pass
pub fn count_messages(messages: &[Message]) -> HashMap<UserId, u64> {
    let mut counts: HashMap<UserId, u64> = HashMap::new();
    for message in messages {
        *counts.entry(message.user_id.clone()).or_insert(0) += 1;
    }
    counts
}
