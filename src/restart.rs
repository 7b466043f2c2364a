//! Restart rate limiting.
//!
//! Restarts draw down a 60 second budget by the time elapsed since the previous
//! restart. While the budget lasts, every restart counts toward the attempt
//! ceiling; once the budget is spent the window starts over and the counter is
//! cleared. Reaching the ceiling inside a single window means the child is
//! crash-looping and the supervisor should give up.
use std::time::{Duration, Instant};

/// Length of the restart accounting window, in milliseconds.
pub const WINDOW_MS: i64 = 60_000;

/// Outcome of evaluating a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Restart the child.
    Continue,
    /// The attempt ceiling was reached inside the window.
    BailOut,
}

/// Mutable counters tracked across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartWindow {
    /// Restarts counted since the window was last replenished.
    pub attempts: u32,
    /// Remaining budget of the current window in milliseconds.
    pub clock_ms: i64,
    /// When the previous restart happened, if any.
    pub last_restart_at: Option<Instant>,
}

impl Default for RestartWindow {
    fn default() -> Self {
        Self {
            attempts: 0,
            clock_ms: WINDOW_MS,
            last_restart_at: None,
        }
    }
}

impl RestartWindow {
    /// Time since the previous restart, zero when there has not been one.
    pub fn since_last_restart(&self, now: Instant) -> Duration {
        self.last_restart_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(Duration::ZERO)
    }

    /// How much of the window has been consumed so far.
    pub fn consumed(&self) -> Duration {
        Duration::from_millis((WINDOW_MS - self.clock_ms).max(0) as u64)
    }

    /// Records `now` as the instant of the latest restart.
    pub fn record_restart(&mut self, now: Instant) {
        self.last_restart_at = Some(now);
    }
}

/// Attempt ceiling applied to a [`RestartWindow`].
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    max_attempts: u32,
}

impl RestartPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts left before the ceiling is reached.
    pub fn remaining(&self, state: &RestartWindow) -> u32 {
        self.max_attempts.saturating_sub(state.attempts)
    }

    /// Evaluates a restart happening at `now`.
    ///
    /// The caller is responsible for calling [`RestartWindow::record_restart`]
    /// afterwards so that the next evaluation measures from this one.
    pub fn decide(&self, state: RestartWindow, now: Instant) -> (RestartWindow, Decision) {
        let elapsed = state.since_last_restart(now).as_millis();
        let elapsed = i64::try_from(elapsed).unwrap_or(i64::MAX);

        let mut next = state;
        next.attempts = next.attempts.saturating_add(1);
        next.clock_ms = next.clock_ms.saturating_sub(elapsed);

        if next.clock_ms <= 0 {
            next.clock_ms = WINDOW_MS;
            next.attempts = 0;
            return (next, Decision::Continue);
        }

        if next.attempts < self.max_attempts {
            (next, Decision::Continue)
        } else {
            (next, Decision::BailOut)
        }
    }
}
