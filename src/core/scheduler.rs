//! Periodic scoring loop.
//!
//! Each cycle reads the whole emotion log, scores the trailing window and
//! appends at most one sample to the score log. Cycles never overlap: the
//! wait for the next cycle starts only after the previous one finished.
//!
//! The wait doubles as the cancellation point. [`StopHandle::stop`] (or
//! dropping every handle) wakes the loop immediately and it returns between
//! cycles, so a sample is either fully appended or not written at all.

use crate::core::scoring::{score_observations, EngagementLevel};
use crate::core::windowing::TrailingWindow;
use crate::observation::{format_timestamp, EngagementScoreSample, ObservationRecord};
use crate::store::{AppendLog, StoreError};
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and alerting parameters for the scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerSettings {
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Width of the trailing window
    pub window: Duration,
    /// Scores below this value are logged as low-engagement alerts
    pub alert_threshold: f64,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            window: Duration::from_secs(30),
            alert_threshold: 50.0,
        }
    }
}

/// Requests that a running scorer stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Sender<()>,
}

impl StopHandle {
    /// Ask the loop to exit after the current cycle.
    pub fn stop(&self) {
        match self.tx.try_send(()) {
            // A pending request is already enough.
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::debug!("stop requested after scorer exited");
            }
        }
    }
}

/// Receiving side of the stop channel, owned by the loop.
#[derive(Debug)]
pub struct StopSignal {
    rx: Receiver<()>,
}

impl StopSignal {
    /// Wait up to `timeout` for a stop request. Returns `true` if the loop
    /// should exit.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Check for an explicit stop request without waiting.
    pub fn is_stopped(&self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

/// Create a connected stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = bounded(1);
    (StopHandle { tx }, StopSignal { rx })
}

/// What a single cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A sample was computed and appended
    Scored(EngagementScoreSample),
    /// No observation fell in the window; nothing was written
    EmptyWindow,
    /// The emotion log could not be read
    SourceFailed(StoreError),
    /// The score was computed but could not be appended
    SinkFailed(EngagementScoreSample, StoreError),
}

impl CycleOutcome {
    pub fn sample(&self) -> Option<&EngagementScoreSample> {
        match self {
            CycleOutcome::Scored(sample) | CycleOutcome::SinkFailed(sample, _) => Some(sample),
            _ => None,
        }
    }
}

/// Run exactly one scoring cycle at the given instant.
pub fn run_cycle<S, K>(
    source: &S,
    sink: &mut K,
    now: NaiveDateTime,
    settings: &ScorerSettings,
) -> CycleOutcome
where
    S: AppendLog<ObservationRecord> + ?Sized,
    K: AppendLog<EngagementScoreSample> + ?Sized,
{
    let records = match source.read_all() {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(error = %e, "failed to read emotion log");
            return CycleOutcome::SourceFailed(e);
        }
    };

    let window = TrailingWindow::from_secs(now, settings.window.as_secs());
    let observations = window.select(&records);
    tracing::debug!(
        records = records.len(),
        in_window = observations.len(),
        window_secs = window.duration_secs(),
        "emotion log read"
    );

    let Some(score) = score_observations(&observations) else {
        return CycleOutcome::EmptyWindow;
    };

    let sample = EngagementScoreSample::new(now, score);
    let level = EngagementLevel::from_score(score);
    tracing::info!(
        timestamp = %format_timestamp(&sample.timestamp),
        score = format_args!("{score:.2}"),
        %level,
        "engagement score"
    );
    if score < settings.alert_threshold {
        tracing::warn!(
            score = format_args!("{score:.2}"),
            threshold = settings.alert_threshold,
            "engagement below alert threshold"
        );
    }

    match sink.append(&sample) {
        Ok(()) => CycleOutcome::Scored(sample),
        Err(e) => {
            tracing::error!(error = %e, "failed to append engagement score");
            CycleOutcome::SinkFailed(sample, e)
        }
    }
}

/// Counters for one run of the scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub cycles: u64,
    pub samples_written: u64,
    pub empty_windows: u64,
    pub source_failures: u64,
    pub sink_failures: u64,
    pub started_at: Option<DateTime<Local>>,
}

impl RunStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Scored(_) => self.samples_written += 1,
            CycleOutcome::EmptyWindow => self.empty_windows += 1,
            CycleOutcome::SourceFailed(_) => self.source_failures += 1,
            CycleOutcome::SinkFailed(..) => self.sink_failures += 1,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let duration = self
            .started_at
            .map(|start| (Local::now() - start).num_seconds().max(0))
            .unwrap_or(0);
        format!(
            "Scorer Statistics:\n\
             - Cycles run: {}\n\
             - Scores written: {}\n\
             - Empty windows: {}\n\
             - Source read failures: {}\n\
             - Sink write failures: {}\n\
             - Run duration: {} seconds",
            self.cycles,
            self.samples_written,
            self.empty_windows,
            self.source_failures,
            self.sink_failures,
            duration
        )
    }
}

/// Run the scorer until stopped.
///
/// The first cycle runs immediately. I/O failures are logged and counted;
/// the loop carries on with the next interval. `clock` supplies "now" for
/// each cycle.
pub fn run_periodic<S, K, C>(
    source: &S,
    sink: &mut K,
    settings: &ScorerSettings,
    stop: &StopSignal,
    mut clock: C,
) -> RunStats
where
    S: AppendLog<ObservationRecord> + ?Sized,
    K: AppendLog<EngagementScoreSample> + ?Sized,
    C: FnMut() -> NaiveDateTime,
{
    let mut stats = RunStats {
        started_at: Some(Local::now()),
        ..RunStats::default()
    };

    tracing::info!(
        interval_secs = settings.interval.as_secs(),
        window_secs = settings.window.as_secs(),
        "engagement scorer started"
    );

    loop {
        if stop.is_stopped() {
            break;
        }

        let outcome = run_cycle(source, sink, clock(), settings);
        stats.record(&outcome);

        if stop.wait(settings.interval) {
            break;
        }
    }

    tracing::info!(
        cycles = stats.cycles,
        samples = stats.samples_written,
        "engagement scorer stopped"
    );
    stats
}

/// Wall-clock "now" as used in both logs, truncated to whole seconds so a
/// stored sample timestamp is exactly the instant its window ended at.
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLog;
    use chrono::{Duration as ChronoDuration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn source(labels: &[&str]) -> MemoryLog<ObservationRecord> {
        MemoryLog::with_records(
            labels
                .iter()
                .map(|label| ObservationRecord::at(now() - ChronoDuration::seconds(1), *label))
                .collect(),
        )
    }

    fn fast_settings() -> ScorerSettings {
        ScorerSettings {
            interval: Duration::from_millis(5),
            ..ScorerSettings::default()
        }
    }

    #[test]
    fn test_cycle_appends_sample() {
        let source = source(&["happy", "happy", "sad"]);
        let mut sink: MemoryLog<EngagementScoreSample> = MemoryLog::new();

        let outcome = run_cycle(&source, &mut sink, now(), &ScorerSettings::default());

        assert!(matches!(outcome, CycleOutcome::Scored(_)));
        assert_eq!(sink.records(), &[EngagementScoreSample::new(now(), 25.0)]);
    }

    #[test]
    fn test_cycle_with_empty_window_writes_nothing() {
        let source: MemoryLog<ObservationRecord> = MemoryLog::new();
        let mut sink: MemoryLog<EngagementScoreSample> = MemoryLog::new();

        let outcome = run_cycle(&source, &mut sink, now(), &ScorerSettings::default());

        assert!(matches!(outcome, CycleOutcome::EmptyWindow));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_cycle_reports_io_failures() {
        let mut source = source(&["happy"]);
        let mut sink: MemoryLog<EngagementScoreSample> = MemoryLog::new();

        sink.set_fail_appends(true);
        let outcome = run_cycle(&source, &mut sink, now(), &ScorerSettings::default());
        assert!(matches!(outcome, CycleOutcome::SinkFailed(..)));
        assert_eq!(outcome.sample().map(|s| s.score), Some(50.0));

        source.set_fail_reads(true);
        let outcome = run_cycle(&source, &mut sink, now(), &ScorerSettings::default());
        assert!(matches!(outcome, CycleOutcome::SourceFailed(_)));
        assert!(outcome.sample().is_none());
    }

    #[test]
    fn test_identical_cycles_are_idempotent() {
        let source = source(&["neutral", "happy", "fear"]);
        let mut sink: MemoryLog<EngagementScoreSample> = MemoryLog::new();

        run_cycle(&source, &mut sink, now(), &ScorerSettings::default());
        run_cycle(&source, &mut sink, now(), &ScorerSettings::default());

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[0], sink.records()[1]);
    }

    #[test]
    fn test_stop_before_start_runs_no_cycles() {
        let source = source(&["happy"]);
        let mut sink: MemoryLog<EngagementScoreSample> = MemoryLog::new();
        let (handle, signal) = stop_channel();

        handle.stop();
        let stats = run_periodic(&source, &mut sink, &fast_settings(), &signal, now);

        assert_eq!(stats.cycles, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_dropped_handle_ends_loop_after_one_cycle() {
        let source = source(&["happy"]);
        let mut sink: MemoryLog<EngagementScoreSample> = MemoryLog::new();
        let (handle, signal) = stop_channel();
        drop(handle);

        // Disconnection is only observed by the wait, after the first cycle.
        let stats = run_periodic(&source, &mut sink, &fast_settings(), &signal, now);

        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.samples_written, 1);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_loop_survives_failing_sink() {
        let source = source(&["happy"]);
        let mut sink: MemoryLog<EngagementScoreSample> = MemoryLog::new();
        sink.set_fail_appends(true);
        let (handle, signal) = stop_channel();

        let mut calls = 0;
        let stats = run_periodic(&source, &mut sink, &fast_settings(), &signal, || {
            calls += 1;
            if calls == 3 {
                handle.stop();
            }
            now()
        });

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.sink_failures, 3);
        assert_eq!(stats.samples_written, 0);
    }

    #[test]
    fn test_local_now_matches_stored_timestamp() {
        let now = local_now();
        assert_eq!(now.nanosecond(), 0);

        // The persisted form reproduces the window anchor exactly.
        let stored = crate::observation::parse_timestamp(&format_timestamp(&now));
        assert_eq!(stored, Some(now));
    }

    #[test]
    fn test_window_edge_observation_survives_storage() {
        let anchor = local_now();
        let edge = anchor - ChronoDuration::seconds(30);
        let source = MemoryLog::with_records(vec![ObservationRecord::at(edge, "happy")]);
        let mut sink: MemoryLog<EngagementScoreSample> = MemoryLog::new();

        let outcome = run_cycle(&source, &mut sink, anchor, &ScorerSettings::default());
        assert!(matches!(outcome, CycleOutcome::Scored(_)));

        // Re-scoring at the stored timestamp gives the same result.
        let stored = &sink.records()[0];
        let rescored = crate::core::compute_score(source.records(), stored.timestamp, 30);
        assert_eq!(rescored, Some(stored.score));
    }

    #[test]
    fn test_stats_summary() {
        let stats = RunStats {
            cycles: 4,
            samples_written: 3,
            empty_windows: 1,
            ..RunStats::default()
        };
        let summary = stats.summary();
        assert!(summary.contains("Cycles run: 4"));
        assert!(summary.contains("Scores written: 3"));
        assert!(summary.contains("Empty windows: 1"));
    }
}
