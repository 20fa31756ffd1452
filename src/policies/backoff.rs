//! # Backoff between serve attempts of a failing service.
//!
//! [`BackoffPolicy`] controls how the delay before the next serve attempt
//! grows after repeated registration failures:
//! - [`BackoffPolicy::first`] the delay after the first failure;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the delay cap;
//! - [`BackoffPolicy::jitter`] randomization applied to the computed delay.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use shellvisor::policies::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(None), Duration::from_millis(500));
//! assert_eq!(
//!     backoff.next(Some(Duration::from_millis(500))),
//!     Duration::from_secs(1)
//! );
//! // Growth is capped at `max`.
//! assert_eq!(
//!     backoff.next(Some(Duration::from_secs(20))),
//!     Duration::from_secs(30)
//! );
//! ```

use std::time::Duration;

use rand::Rng;

/// Randomization applied to computed backoff delays.
///
/// Many nodes often lose the same bus at the same moment; jitter keeps their
/// re-registration attempts from arriving in lockstep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the exact computed delay.
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]` — keeps most of the backoff while
    /// spreading the herd.
    Equal,
}

impl JitterPolicy {
    /// Applies this jitter to a computed delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = (delay.as_millis().min(u128::from(u64::MAX))) as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let jitter = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + jitter)
            }
        }
    }
}

/// Delay schedule between serve attempts of a failing service.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` expected).
    pub factor: f64,
    /// Randomization applied to the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns the daemon's restart pacing: 500 ms doubling up to 30 s with
    /// equal jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// Computes the next delay from the previous one.
    ///
    /// - `None` previous delay yields `first` clamped to `max`.
    /// - Otherwise the previous delay is multiplied by `factor` and capped
    ///   at `max`.
    ///
    /// Jitter is applied after clamping.
    pub fn next(&self, prev: Option<Duration>) -> Duration {
        let unclamped = match prev {
            None => self.first,
            Some(d) => {
                let grown = d.as_secs_f64() * self.factor;
                if grown.is_finite() {
                    d.mul_f64(self.factor)
                } else {
                    self.max
                }
            }
        };
        self.jitter.apply(unclamped.min(self.max))
    }
}
