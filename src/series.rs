//! Cumulative channel activity series
//!
//! One point per calendar day of the window. Each point carries, for every
//! channel seen in the filtered messages, the running total of that channel's
//! messages up to and including the day.

use crate::filter::DateWindow;
use crate::types::{ChannelActivityPoint, ChannelCount, Message, ALL_CHANNELS, SERIES_DATE_KEY};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Names that would collide with the series `date` key or the `all` selector
const RESERVED_CHANNEL_NAMES: [&str; 2] = [SERIES_DATE_KEY, ALL_CHANNELS];

/// Distinct channel names in first-appearance order.
///
/// Reserved names are skipped; messages in such channels still count toward
/// every other metric.
pub fn channel_names<'a, I>(messages: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut names: Vec<String> = Vec::new();
    for message in messages {
        if RESERVED_CHANNEL_NAMES.contains(&message.channel_name.as_str()) {
            continue;
        }
        if !names.iter().any(|n| *n == message.channel_name) {
            names.push(message.channel_name.clone());
        }
    }
    names
}

/// Build the cumulative series over already-filtered messages
pub fn channel_activity_series(messages: &[Message], window: &DateWindow) -> Vec<ChannelActivityPoint> {
    let channels = channel_names(messages);

    // (day, channel index) -> messages that day
    let mut daily: HashMap<(NaiveDate, usize), u64> = HashMap::new();
    for message in messages {
        let Some(ts) = message.timestamp else { continue };
        let Some(index) = channels.iter().position(|c| *c == message.channel_name) else {
            continue;
        };
        *daily.entry((window.local_date(ts), index)).or_insert(0) += 1;
    }

    let mut running = vec![0u64; channels.len()];
    let series: Vec<ChannelActivityPoint> = window
        .days()
        .into_iter()
        .map(|date| {
            for (index, total) in running.iter_mut().enumerate() {
                *total += daily.get(&(date, index)).copied().unwrap_or(0);
            }
            ChannelActivityPoint {
                date,
                channels: channels
                    .iter()
                    .zip(&running)
                    .map(|(channel, cumulative)| ChannelCount {
                        channel: channel.clone(),
                        cumulative: *cumulative,
                    })
                    .collect(),
            }
        })
        .collect();

    tracing::debug!(days = series.len(), channels = channels.len(), "built channel series");

    series
}
