//! Engagement score computation.
//!
//! The score is the mean emotion weight over the trailing window, scaled by
//! [`SCORE_SCALE`] and clamped to `[0, 100]`.
//!
//! With the current weight table the mean can never exceed 2, so the highest
//! reachable score is 50 and the upper half of the range stays unused. The
//! formula is kept as-is until the scale is confirmed.

use crate::core::windowing::TrailingWindow;
use crate::observation::{EmotionObservation, ObservationRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Multiplier applied to the mean weight.
pub const SCORE_SCALE: f64 = 25.0;

/// Lowest possible score.
pub const MIN_SCORE: f64 = 0.0;

/// Highest possible score.
pub const MAX_SCORE: f64 = 100.0;

/// Compute the engagement score for the records inside
/// `[now - window_secs, now]`.
///
/// Returns `None` when no record with a valid timestamp falls in the window.
pub fn compute_score(
    records: &[ObservationRecord],
    now: NaiveDateTime,
    window_secs: u64,
) -> Option<f64> {
    let window = TrailingWindow::from_secs(now, window_secs);
    score_observations(&window.select(records))
}

/// Score observations that have already been windowed.
pub fn score_observations(observations: &[EmotionObservation]) -> Option<f64> {
    if observations.is_empty() {
        return None;
    }

    // Integer sum keeps the mean independent of record order.
    let total: i64 = observations
        .iter()
        .map(|obs| i64::from(obs.emotion.weight()))
        .sum();
    let mean_weight = total as f64 / observations.len() as f64;

    Some((mean_weight * SCORE_SCALE).clamp(MIN_SCORE, MAX_SCORE))
}

/// Qualitative band for a score, matching the dashboard thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    /// Score above 70
    High,
    /// Score from 50 to 70
    Moderate,
    /// Score below 50
    Low,
}

impl EngagementLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 70.0 {
            EngagementLevel::High
        } else if score >= 50.0 {
            EngagementLevel::Moderate
        } else {
            EngagementLevel::Low
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngagementLevel::High => write!(f, "high"),
            EngagementLevel::Moderate => write!(f, "moderate"),
            EngagementLevel::Low => write!(f, "low"),
        }
    }
}
