//! Trailing time window used to select observations for a score.
//!
//! Unlike fixed collection bins, the window is anchored at the moment of
//! computation and looks backwards: `[now - width, now]`, both ends inclusive.

use crate::observation::{EmotionObservation, ObservationRecord};
use chrono::{Duration, NaiveDateTime};

/// A closed time interval ending at the scoring instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingWindow {
    /// Oldest timestamp still inside the window
    pub start: NaiveDateTime,
    /// Scoring instant
    pub end: NaiveDateTime,
}

impl TrailingWindow {
    /// Create the window of the given width ending at `now`.
    pub fn ending_at(now: NaiveDateTime, width: Duration) -> Self {
        Self {
            start: now.checked_sub_signed(width).unwrap_or(NaiveDateTime::MIN),
            end: now,
        }
    }

    /// Same as [`TrailingWindow::ending_at`] with the width in seconds.
    pub fn from_secs(now: NaiveDateTime, width_secs: u64) -> Self {
        let width = i64::try_from(width_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::ending_at(now, width)
    }

    /// Check if a timestamp falls within this window.
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Parse raw records and keep those inside the window.
    ///
    /// Records with malformed timestamps are dropped silently.
    pub fn select<'a, I>(&self, records: I) -> Vec<EmotionObservation>
    where
        I: IntoIterator<Item = &'a ObservationRecord>,
    {
        records
            .into_iter()
            .filter_map(ObservationRecord::parse)
            .filter(|obs| self.contains(obs.timestamp))
            .collect()
    }

    /// Get the width of this window in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }
}
