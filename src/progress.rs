//! Progress and throughput reporting.
//!
//! Progress is a fixed-point percentage in hundredths (10000 = 100.00%),
//! estimated from engine output lines against the job's length limit. Speed
//! is lines per second over the last report window.
use std::fmt;
use std::time::{Duration, Instant};

/// Fixed-point 100%.
pub const PROGRESS_COMPLETE: u64 = 10_000;

/// One `STATUS` protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub progress: u64,
    pub speed: u64,
}

impl Status {
    /// The line sent once after a run finishes normally.
    pub const COMPLETE: Status = Status {
        progress: PROGRESS_COMPLETE,
        speed: 0,
    };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STATUS {} {}", self.progress, self.speed)
    }
}

/// Counters for one supervised run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub lines_processed: u64,
    pub last_counter: u64,
    pub started: Instant,
    pub last_report: Instant,
}

impl RunState {
    pub fn new(now: Instant) -> Self {
        Self {
            lines_processed: 0,
            last_counter: 0,
            started: now,
            last_report: now,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    pub fn since_report(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_report)
    }
}

/// `floor(lines / length * 10000)`, capped at 100%. Zero when no length
/// limit is configured.
pub fn progress(lines_processed: u64, length: u64) -> u64 {
    if length == 0 {
        return 0;
    }
    let scaled = (lines_processed as f64 / length as f64 * PROGRESS_COMPLETE as f64).floor();
    (scaled as u64).min(PROGRESS_COMPLETE)
}

/// Lines per second, truncated. Zero over an empty window.
pub fn speed(lines: u64, window: Duration) -> u64 {
    let secs = window.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    (lines as f64 / secs) as u64
}

/// Compute the current status and start a new report window at `now`.
pub fn report(state: &mut RunState, length: u64, now: Instant) -> Status {
    let delta = state.lines_processed.saturating_sub(state.last_counter);
    let status = Status {
        progress: progress(state.lines_processed, length),
        speed: speed(delta, state.since_report(now)),
    };
    state.last_counter = state.lines_processed;
    state.last_report = now;
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_floored_hundredths() {
        assert_eq!(progress(1, 3), 3333);
        assert_eq!(progress(2, 3), 6666);
        assert_eq!(progress(50, 100), 5000);
        assert_eq!(progress(100, 100), PROGRESS_COMPLETE);
    }

    #[test]
    fn progress_without_length_is_zero() {
        assert_eq!(progress(12345, 0), 0);
    }

    #[test]
    fn progress_caps_at_complete() {
        assert_eq!(progress(1_000, 10), PROGRESS_COMPLETE);
    }

    #[test]
    fn speed_guards_empty_window() {
        assert_eq!(speed(500, Duration::ZERO), 0);
        assert_eq!(speed(500, Duration::from_secs(5)), 100);
        assert_eq!(speed(7, Duration::from_secs(2)), 3);
    }

    #[test]
    fn report_advances_window_and_stays_monotone() {
        let t0 = Instant::now();
        let mut state = RunState::new(t0);
        let mut last = 0;
        for step in 1..=5u64 {
            state.lines_processed += 40;
            let now = t0 + Duration::from_secs(5 * step);
            let status = report(&mut state, 1000, now);
            assert!(status.progress >= last);
            last = status.progress;
            assert_eq!(status.speed, 8);
            assert_eq!(state.last_counter, state.lines_processed);
            assert_eq!(state.last_report, now);
        }
        assert_eq!(last, 2000);
    }

    #[test]
    fn report_at_same_instant_has_zero_speed() {
        let t0 = Instant::now();
        let mut state = RunState::new(t0);
        state.lines_processed = 10;
        let status = report(&mut state, 0, t0);
        assert_eq!(status, Status { progress: 0, speed: 0 });
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(Status::COMPLETE.to_string(), "STATUS 10000 0");
        assert_eq!(
            Status {
                progress: 42,
                speed: 7
            }
            .to_string(),
            "STATUS 42 7"
        );
    }
}
