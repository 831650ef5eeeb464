use std::num::NonZeroU32;
use std::time::Duration;

/// Bounds for retrying a provisioning operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: NonZeroU32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(NonZeroU32::new(60).unwrap_or(NonZeroU32::MIN), Duration::from_secs(60))
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: NonZeroU32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) has failed.
    pub const fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.get()
    }
}

/// Bounds for polling an asynchronous condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of checks before declaring a timeout.
    pub max_attempts: NonZeroU32,
    /// Pause between two consecutive checks.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(NonZeroU32::new(50).unwrap_or(NonZeroU32::MIN), Duration::from_secs(15))
    }
}

impl PollPolicy {
    pub const fn new(max_attempts: NonZeroU32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Worst-case wall time spent sleeping, `(attempts - 1) × interval`.
    pub fn deadline(&self) -> Duration {
        self.interval * self.max_attempts.get().saturating_sub(1)
    }
}

/// Blocking pause between attempts.
///
/// The blocking drivers take a `Sleeper` so tests can count delays without
/// actually waiting.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
