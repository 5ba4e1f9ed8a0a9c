//! Classroom Engagement - rolling engagement score from emotion observations.
//!
//! An external capture process classifies faces and appends one
//! `(timestamp, emotion)` row per frame to an emotion log. This crate polls
//! that log, scores the most recent observations and appends the result to an
//! engagement log read by the dashboard.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Engagement Scorer                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │ emotions.csv│──▶│  Trailing   │──▶│   Weighted  │         │
//! │  │  (source)   │   │ window (30s)│   │    mean     │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │                                             │                │
//! │                                             ▼                │
//! │                                     ┌───────────────┐        │
//! │                                     │engagement.csv │        │
//! │                                     │    (sink)     │        │
//! │                                     └───────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use classroom_engagement::{core, store::CsvLog, Config};
//! use classroom_engagement::{EngagementScoreSample, ObservationRecord};
//!
//! let config = Config::load().unwrap_or_default();
//! let source: CsvLog<ObservationRecord> = CsvLog::new(config.emotion_log_path());
//! let mut sink: CsvLog<EngagementScoreSample> = CsvLog::new(config.engagement_log_path());
//!
//! let (handle, signal) = core::stop_channel();
//! // Hand `handle` to a signal handler, then block until it fires.
//! let stats = core::run_periodic(
//!     &source,
//!     &mut sink,
//!     &config.scorer_settings(),
//!     &signal,
//!     core::local_now,
//! );
//! println!("{}", stats.summary());
//! # drop(handle);
//! ```

pub mod config;
pub mod core;
pub mod observation;
pub mod report;
pub mod store;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    compute_score, run_cycle, run_periodic, stop_channel, CycleOutcome, EngagementLevel,
    RunStats, ScorerSettings, StopHandle, StopSignal, TrailingWindow,
};
pub use observation::{Emotion, EmotionObservation, EngagementScoreSample, ObservationRecord};
pub use report::SessionReport;
pub use store::{AppendLog, CsvLog, MemoryLog, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Weight table as shown to operators.
pub const WEIGHT_TABLE: &str = r#"
  Emotion     Weight
  ---------   ------
  happy         +2
  neutral       +1
  surprise      +1
  fear          -1
  sad           -1
  bored         -2
  angry         -2
  disgust       -2
  (other)        0

  score = clamp(mean weight x 25, 0, 100), over the trailing window.
  With these weights the highest reachable score is 50.
"#;
