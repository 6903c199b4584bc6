//! Rolling call statistics.
//!
//! Counters live in a fixed window (1 hour by default). Every call first
//! checks whether the window has elapsed and, if so, resets all counters
//! before recording the new sample, so a snapshot never mixes windows.
//!
//! The average response time is the last-sample-biased blend
//! `avg = (avg + sample) / 2`, starting from zero. The newest sample always
//! weighs 50%; this is not an arithmetic mean.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::telemetry;

/// Default statistics window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub total_calls: u64,
    pub success_calls: u64,
    pub error_calls: u64,
    /// Biased running average of successful call durations, in milliseconds.
    pub avg_response_ms: f64,
    pub window_start: Instant,
}

impl Statistics {
    fn empty(now: Instant) -> Self {
        Self {
            total_calls: 0,
            success_calls: 0,
            error_calls: 0,
            avg_response_ms: 0.0,
            window_start: now,
        }
    }

    /// Share of calls that failed, `0.0` when nothing was recorded.
    pub fn error_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.error_calls as f64 / self.total_calls as f64
        }
    }
}

/// Window-based call counters.
#[derive(Debug)]
pub struct StatsCollector {
    current: Mutex<Statistics>,
    window: Duration,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl StatsCollector {
    pub fn new(window: Duration) -> Self {
        Self {
            current: Mutex::new(Statistics::empty(Instant::now())),
            window,
        }
    }

    /// Record one settled call.
    ///
    /// Only successful calls contribute to the average response time.
    pub fn record(&self, is_error: bool, duration: Duration) {
        let mut stats = self.roll();
        stats.total_calls += 1;
        if is_error {
            stats.error_calls += 1;
        } else {
            stats.success_calls += 1;
            let sample = duration.as_secs_f64() * 1_000.0;
            stats.avg_response_ms = (stats.avg_response_ms + sample) / 2.0;
        }
        drop(stats);

        let status = if is_error { "error" } else { "ok" };
        metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => status).increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    /// Current counters (after applying any pending window reset).
    pub fn snapshot(&self) -> Statistics {
        *self.roll()
    }

    /// Reset all counters and start a new window now.
    pub fn reset(&self) {
        *self.lock() = Statistics::empty(Instant::now());
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Lock the counters, resetting them first if the window has elapsed.
    fn roll(&self) -> MutexGuard<'_, Statistics> {
        let mut stats = self.lock();
        let now = Instant::now();
        if now.duration_since(stats.window_start) >= self.window {
            *stats = Statistics::empty(now);
        }
        stats
    }

    fn lock(&self) -> MutexGuard<'_, Statistics> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_successes_and_errors() {
        let stats = StatsCollector::default();
        for _ in 0..3 {
            stats.record(false, Duration::from_millis(100));
        }
        stats.record(true, Duration::from_millis(50));
        stats.record(true, Duration::from_millis(50));

        let snap = stats.snapshot();
        assert_eq!(snap.total_calls, 5);
        assert_eq!(snap.success_calls, 3);
        assert_eq!(snap.error_calls, 2);
        assert!((snap.error_rate() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn average_is_last_sample_biased() {
        let stats = StatsCollector::default();
        stats.record(false, Duration::from_millis(100));
        assert!((stats.snapshot().avg_response_ms - 50.0).abs() < 1e-9);
        stats.record(false, Duration::from_millis(300));
        assert!((stats.snapshot().avg_response_ms - 175.0).abs() < 1e-9);
        // Errors leave the average alone.
        stats.record(true, Duration::from_millis(10_000));
        assert!((stats.snapshot().avg_response_ms - 175.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn crossing_window_resets_before_recording() {
        let stats = StatsCollector::new(Duration::from_secs(3600));
        stats.record(false, Duration::from_millis(10));
        stats.record(true, Duration::from_millis(10));

        tokio::time::advance(Duration::from_secs(3600)).await;
        stats.record(true, Duration::from_millis(10));

        let snap = stats.snapshot();
        assert_eq!(snap.total_calls, 1);
        assert_eq!(snap.success_calls, 0);
        assert_eq!(snap.error_calls, 1);
        assert_eq!(snap.avg_response_ms, 0.0);
    }

    #[test]
    fn reset_zeroes_counters() {
        let stats = StatsCollector::default();
        stats.record(false, Duration::from_millis(10));
        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.total_calls, 0);
        assert_eq!(snap.avg_response_ms, 0.0);
    }
}
