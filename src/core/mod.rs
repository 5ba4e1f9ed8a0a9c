//! Core functionality for the engagement scorer.
//!
//! This module contains:
//! - The trailing window used to select observations
//! - Score computation from emotion weights
//! - The cancellable periodic scoring loop

pub mod scheduler;
pub mod scoring;
pub mod windowing;

// Re-export commonly used types
pub use scheduler::{
    local_now, run_cycle, run_periodic, stop_channel, CycleOutcome, RunStats, ScorerSettings,
    StopHandle, StopSignal,
};
pub use scoring::{
    compute_score, score_observations, EngagementLevel, MAX_SCORE, MIN_SCORE, SCORE_SCALE,
};
pub use windowing::TrailingWindow;
