//! Observation and score records.
//!
//! The emotion log is written by an external capture process; the score log
//! is written by the scorer. Both are plain rows with a timestamp column.

pub mod types;

// Re-export commonly used types
pub use types::{
    format_timestamp, parse_timestamp, Emotion, EmotionObservation, EngagementScoreSample,
    ObservationRecord, TIMESTAMP_FORMAT,
};
