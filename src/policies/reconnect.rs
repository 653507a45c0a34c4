//! # Backoff policy for reconnecting dropped connections.
//!
//! [`ReconnectPolicy`] controls how recovery delays grow after repeated
//! disconnects. It is parameterized by:
//! - [`ReconnectPolicy::first`] — the delay before the first reattempt;
//! - [`ReconnectPolicy::factor`] — the multiplicative growth factor;
//! - [`ReconnectPolicy::cap`] — the maximum delay;
//! - [`ReconnectPolicy::max_attempts`] — the attempt budget.
//!
//! The delay for attempt `k` (1-indexed, counted from the attempt counter the
//! container increments on each close) is `first × factor^(k-1)`, clamped to
//! `cap`. The computation is pure and deterministic: the same attempt number
//! always yields the same delay, so the schedule is testable exactly.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use connvisor::ReconnectPolicy;
//!
//! let policy = ReconnectPolicy::default();
//!
//! // Attempt 1 — uses 'first' (5s)
//! assert_eq!(policy.delay_for(1), Duration::from_secs(5));
//!
//! // Attempt 4 — 5s × 2^3 = 40s
//! assert_eq!(policy.delay_for(4), Duration::from_secs(40));
//!
//! // Attempt 10 — 5s × 2^9 = 2560s → capped at 300s
//! assert_eq!(policy.delay_for(10), Duration::from_secs(300));
//! ```

use std::time::Duration;

/// Reconnection backoff policy.
///
/// Pure and stateless: the container tracks the attempt counter, the policy
/// only maps it to a delay and bounds the budget.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    /// Delay before the first reattempt.
    pub first: Duration,
    /// Maximum delay cap.
    pub cap: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Maximum number of automatic reattempts before the container gives up
    /// and stays parked at reduced health.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    /// Returns a schedule with:
    /// - `first = 5s`;
    /// - `factor = 2.0`;
    /// - `cap = 300s` (5 minutes);
    /// - `max_attempts = 10`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(5),
            cap: Duration::from_secs(300),
            factor: 2.0,
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Computes the delay for the given attempt number (1-indexed; the
    /// counter is incremented before the delay is computed).
    ///
    /// The base delay is `first × factor^(attempt-1)`, clamped to
    /// [`ReconnectPolicy::cap`]. Attempt `0` is treated as `1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let cap_secs = self.cap.as_secs_f64();
        let exp = (attempt - 1).min(i32::MAX as u32) as i32;
        let raw_secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !raw_secs.is_finite() || raw_secs < 0.0 || raw_secs > cap_secs {
            self.cap
        } else {
            Duration::from_secs_f64(raw_secs)
        }
    }

    /// Whether the budget allows another reattempt after `attempts` already
    /// counted.
    #[inline]
    pub fn budget_left(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
