//! Date window resolution and message filtering
//!
//! This module turns an `AnalysisRequest` into a concrete calendar window and
//! restricts messages to that window and the selected channel. Every later stage
//! consumes the filtered set.

use crate::error::AnalyticsError;
use crate::types::{AnalysisRequest, AnalysisWindow, ChannelFilter, Message};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Calendar years a window may touch; keeps every derived cutoff representable
const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// A resolved calendar window.
///
/// Days are calendar days in a fixed UTC offset. The window spans from the start
/// of `start` to the last millisecond of `end`, both inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
    requested_end: NaiveDate,
    offset: FixedOffset,
}

impl DateWindow {
    /// Resolve a window, clamping it to `max_days` past `start`.
    ///
    /// An over-long window is not an error: `end` moves back to `start + max_days`.
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        utc_offset_minutes: i32,
        max_days: i64,
    ) -> Result<Self, AnalyticsError> {
        if end < start {
            return Err(AnalyticsError::InvalidRange(format!(
                "end date {end} is before start date {start}"
            )));
        }

        if !SUPPORTED_YEARS.contains(&start.year()) || !SUPPORTED_YEARS.contains(&end.year()) {
            return Err(AnalyticsError::InvalidRange(format!(
                "dates must fall between years {} and {} (got {start} to {end})",
                SUPPORTED_YEARS.start(),
                SUPPORTED_YEARS.end()
            )));
        }

        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AnalyticsError::InvalidRange(format!(
                    "UTC offset of {utc_offset_minutes} minutes is out of range"
                ))
            })?;

        let cap = start
            .checked_add_signed(Duration::days(max_days))
            .unwrap_or(NaiveDate::MAX);
        let effective_end = end.min(cap);
        if effective_end != end {
            tracing::debug!(%start, requested_end = %end, %effective_end, "clamped analysis window");
        }

        Ok(Self {
            start,
            end: effective_end,
            requested_end: end,
            offset,
        })
    }

    /// Resolve the window a request asks for
    pub fn from_request(request: &AnalysisRequest, max_days: i64) -> Result<Self, AnalyticsError> {
        Self::new(request.start, request.end, request.utc_offset_minutes, max_days)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Effective last day after clamping
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn is_clamped(&self) -> bool {
        self.end != self.requested_end
    }

    /// First instant of the start day
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.local_to_utc(self.start.and_time(NaiveTime::MIN))
    }

    /// Last millisecond of the end day
    pub fn end_instant(&self) -> DateTime<Utc> {
        let end_of_day = self.end.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::milliseconds(1);
        self.local_to_utc(end_of_day)
    }

    /// Whether an instant falls inside the window
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_instant() <= instant && instant <= self.end_instant()
    }

    /// Calendar date of an instant in the window's offset
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Every calendar day from start to end, inclusive
    pub fn days(&self) -> Vec<NaiveDate> {
        self.start.iter_days().take_while(|day| *day <= self.end).collect()
    }

    /// Echo of the window for the output
    pub fn describe(&self, request: &AnalysisRequest) -> AnalysisWindow {
        AnalysisWindow {
            start: self.start,
            end: self.end,
            requested_end: self.requested_end,
            clamped: self.is_clamped(),
            channel: request.channel.clone(),
            utc_offset_minutes: request.utc_offset_minutes,
            evaluated_at: request.now,
        }
    }

    fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        utc.and_utc()
    }
}

/// Result of filtering a message set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredMessages {
    pub messages: Vec<Message>,
    /// Messages dropped because they had no usable timestamp
    pub without_timestamp: u64,
}

/// Filter engine for messages
pub struct MessageFilter;

impl MessageFilter {
    /// Keep messages inside the window and on the selected channel.
    ///
    /// Messages without a timestamp can never be placed in a window, so they are
    /// dropped and counted rather than failing the pass.
    pub fn filter(messages: &[Message], window: &DateWindow, channel: &ChannelFilter) -> FilteredMessages {
        let start = window.start_instant();
        let end = window.end_instant();
        let mut without_timestamp = 0;

        let kept: Vec<Message> = messages
            .iter()
            .filter(|message| match message.timestamp {
                Some(ts) => start <= ts && ts <= end,
                None => {
                    without_timestamp += 1;
                    false
                }
            })
            .filter(|message| channel.matches(&message.channel_name))
            .cloned()
            .collect();

        tracing::debug!(
            input = messages.len(),
            kept = kept.len(),
            without_timestamp,
            channel = %channel,
            "filtered messages"
        );

        FilteredMessages {
            messages: kept,
            without_timestamp,
        }
    }
}
