//! Record types shared by the emotion log and the engagement-score log.
//!
//! Timestamps are local wall-clock times, the same clock the capture process
//! uses when it writes the emotion log.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format used for every timestamp this crate writes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Additional naive layouts accepted when reading.
const ACCEPTED_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a timestamp as written by the capture process.
///
/// Returns `None` for anything unparseable; callers treat that as a record
/// outside every window.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

/// Format a timestamp the way both logs store it.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Emotion label produced by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Emotion {
    Happy,
    Neutral,
    Surprise,
    Fear,
    Sad,
    Bored,
    Angry,
    Disgust,
    /// Any label outside the weight table (kept verbatim, lowercased)
    Other(String),
}

impl Emotion {
    /// Classify a raw label. Matching ignores case and surrounding whitespace.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "happy" => Emotion::Happy,
            "neutral" => Emotion::Neutral,
            "surprise" => Emotion::Surprise,
            "fear" => Emotion::Fear,
            "sad" => Emotion::Sad,
            "bored" => Emotion::Bored,
            "angry" => Emotion::Angry,
            "disgust" => Emotion::Disgust,
            _ => Emotion::Other(label),
        }
    }

    /// Engagement weight of this emotion.
    pub fn weight(&self) -> i32 {
        match self {
            Emotion::Happy => 2,
            Emotion::Neutral | Emotion::Surprise => 1,
            Emotion::Fear | Emotion::Sad => -1,
            Emotion::Bored | Emotion::Angry | Emotion::Disgust => -2,
            Emotion::Other(_) => 0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Surprise => "surprise",
            Emotion::Fear => "fear",
            Emotion::Sad => "sad",
            Emotion::Bored => "bored",
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Other(label) => label,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the emotion log exactly as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub timestamp: String,
    pub emotion: String,
}

impl ObservationRecord {
    pub fn new(timestamp: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            emotion: emotion.into(),
        }
    }

    /// Record an observation at the given time using the canonical format.
    pub fn at(timestamp: NaiveDateTime, emotion: impl Into<String>) -> Self {
        Self::new(format_timestamp(&timestamp), emotion)
    }

    /// Parse into a typed observation, or `None` if the timestamp is malformed.
    pub fn parse(&self) -> Option<EmotionObservation> {
        Some(EmotionObservation {
            timestamp: parse_timestamp(&self.timestamp)?,
            emotion: Emotion::from_label(&self.emotion),
        })
    }
}

/// A single emotion observation with a valid timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionObservation {
    /// When the capture process recorded the observation
    pub timestamp: NaiveDateTime,
    /// Classified emotion
    pub emotion: Emotion,
}

/// One computed engagement score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementScoreSample {
    /// Wall-clock time the score was computed
    #[serde(with = "timestamp_serde")]
    pub timestamp: NaiveDateTime,
    /// Score in [0, 100]
    #[serde(rename = "engagement_score")]
    pub score: f64,
}

impl EngagementScoreSample {
    pub fn new(timestamp: NaiveDateTime, score: f64) -> Self {
        Self { timestamp, score }
    }
}

/// Serde support for timestamps in [`TIMESTAMP_FORMAT`].
mod timestamp_serde {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(timestamp))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}
