use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PollError;
use crate::policy::PollPolicy;

/// Lifecycle of a polling sequence.
///
/// Starts in `Running`; the other three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    Running,
    Succeeded,
    TimedOut,
    Failed,
}

impl PollState {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Running => write!(f, "RUNNING"),
            PollState::Succeeded => write!(f, "SUCCEEDED"),
            PollState::TimedOut => write!(f, "TIMED_OUT"),
            PollState::Failed => write!(f, "FAILED"),
        }
    }
}

/// The result of feeding one check outcome to the poller.
#[derive(Debug, PartialEq)]
pub enum PollStep<E> {
    /// Still pending; check again after the given pause.
    Wait(Duration),
    /// The condition was met on attempt `attempts`.
    Succeeded { attempts: u32 },
    /// The check failed or the budget ran out.
    Failed(PollError<E>),
    /// The poller had already reached this terminal state; the outcome was
    /// ignored.
    Settled(PollState),
}

/// Counts check attempts against a [`PollPolicy`] and decides when to stop.
///
/// The poller never sleeps or calls the check itself, so the same machine
/// serves the blocking and async drivers.
#[derive(Debug, Clone)]
pub struct ConditionPoller {
    policy: PollPolicy,
    state: PollState,
    attempts: u32,
}

impl ConditionPoller {
    pub const fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            state: PollState::Running,
            attempts: 0,
        }
    }

    pub const fn state(&self) -> PollState {
        self.state
    }

    /// Checks observed so far.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub const fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Record the outcome of one check, where `Ok(true)` means "keep polling".
    ///
    /// - `Ok(false)` moves to `Succeeded`.
    /// - `Err` moves to `Failed` at once, whatever budget remains.
    /// - `Ok(true)` stays `Running` while attempts remain, otherwise moves to
    ///   `TimedOut`.
    pub fn observe<E>(&mut self, outcome: Result<bool, E>) -> PollStep<E> {
        if self.state.is_terminal() {
            return PollStep::Settled(self.state);
        }
        match self.advance(outcome) {
            Progress::Wait(interval) => PollStep::Wait(interval),
            Progress::Done(Ok(attempts)) => PollStep::Succeeded { attempts },
            Progress::Done(Err(err)) => PollStep::Failed(err),
        }
    }

    // Drivers own their poller and stop at the first `Done`, so they skip the
    // terminal-state guard of `observe`.
    pub(super) fn advance<E>(&mut self, outcome: Result<bool, E>) -> Progress<E> {
        self.attempts += 1;

        match outcome {
            Err(error) => {
                self.state = PollState::Failed;
                Progress::Done(Err(PollError::Check {
                    attempt: self.attempts,
                    error,
                }))
            }
            Ok(false) => {
                self.state = PollState::Succeeded;
                Progress::Done(Ok(self.attempts))
            }
            Ok(true) if self.attempts < self.policy.max_attempts.get() => {
                Progress::Wait(self.policy.interval)
            }
            Ok(true) => {
                self.state = PollState::TimedOut;
                Progress::Done(Err(PollError::Timeout {
                    attempts: self.attempts,
                    interval: self.policy.interval,
                }))
            }
        }
    }
}

/// A check outcome as seen by a driver loop.
pub(super) enum Progress<E> {
    Wait(Duration),
    Done(Result<u32, PollError<E>>),
}
