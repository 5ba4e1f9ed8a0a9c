//! Session summary built from the emotion and engagement logs.

use crate::core::EngagementLevel;
use crate::observation::{format_timestamp, Emotion, EngagementScoreSample, ObservationRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Aggregate view of a recorded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Number of emotion rows with a valid timestamp
    pub observations: usize,
    /// Emotion rows skipped because of a malformed timestamp
    pub malformed_observations: usize,
    /// Observation count per emotion label
    pub emotion_counts: BTreeMap<String, usize>,
    /// Number of engagement samples
    pub samples: usize,
    pub average_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    /// Sample standard deviation, when at least two samples exist
    pub score_std_dev: Option<f64>,
    pub latest_score: Option<f64>,
    pub latest_level: Option<EngagementLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_sample_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sample_at: Option<String>,
}

impl SessionReport {
    pub fn build(observations: &[ObservationRecord], samples: &[EngagementScoreSample]) -> Self {
        let mut emotion_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut valid = 0;
        for obs in observations.iter().filter_map(ObservationRecord::parse) {
            valid += 1;
            *emotion_counts
                .entry(obs.emotion.as_str().to_string())
                .or_default() += 1;
        }

        let scores: Vec<f64> = samples.iter().map(|s| s.score).collect();
        let (average_score, min_score, max_score) = if scores.is_empty() {
            (None, None, None)
        } else {
            (
                Some(scores.iter().mean()),
                Some(Statistics::min(scores.iter())),
                Some(Statistics::max(scores.iter())),
            )
        };
        let score_std_dev = (scores.len() >= 2).then(|| scores.iter().std_dev());

        let latest = samples.iter().max_by_key(|s| s.timestamp);
        let first = samples.iter().map(|s| s.timestamp).min();
        let last = samples.iter().map(|s| s.timestamp).max();

        Self {
            observations: valid,
            malformed_observations: observations.len() - valid,
            emotion_counts,
            samples: samples.len(),
            average_score,
            min_score,
            max_score,
            score_std_dev,
            latest_score: latest.map(|s| s.score),
            latest_level: latest.map(|s| EngagementLevel::from_score(s.score)),
            first_sample_at: first.as_ref().map(format_timestamp),
            last_sample_at: last.as_ref().map(format_timestamp),
        }
    }

    /// Count of a known emotion.
    pub fn count_of(&self, emotion: &Emotion) -> usize {
        self.emotion_counts
            .get(emotion.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("Class Summary Report\n");
        out.push_str("====================\n\n");

        out.push_str(&format!("Engagement samples: {}\n", self.samples));
        if let (Some(first), Some(last)) = (&self.first_sample_at, &self.last_sample_at) {
            out.push_str(&format!("  Period: {first} to {last}\n"));
        }
        match self.average_score {
            Some(avg) => {
                out.push_str(&format!("  Average engagement: {avg:.2}\n"));
                if let (Some(min), Some(max)) = (self.min_score, self.max_score) {
                    out.push_str(&format!("  Range: {min:.2} - {max:.2}\n"));
                }
                if let Some(sd) = self.score_std_dev {
                    out.push_str(&format!("  Std deviation: {sd:.2}\n"));
                }
                if let (Some(score), Some(level)) = (self.latest_score, self.latest_level) {
                    out.push_str(&format!("  Latest: {score:.2} ({level})\n"));
                }
            }
            None => out.push_str("  No engagement scores recorded yet.\n"),
        }

        out.push_str(&format!("\nEmotion observations: {}\n", self.observations));
        if self.malformed_observations > 0 {
            out.push_str(&format!(
                "  Skipped (bad timestamp): {}\n",
                self.malformed_observations
            ));
        }
        for (label, count) in &self.emotion_counts {
            out.push_str(&format!("  {label}: {count}\n"));
        }

        out
    }
}

/// Samples recorded within `[start, end]`.
pub fn samples_between(
    samples: &[EngagementScoreSample],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<EngagementScoreSample> {
    samples
        .iter()
        .filter(|s| s.timestamp >= start && s.timestamp <= end)
        .cloned()
        .collect()
}
