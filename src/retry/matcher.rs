use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::rule::TransientErrorRule;
use crate::error::RetryError;
use crate::policy::{RetryPolicy, Sleeper, ThreadSleeper};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision<'a> {
    /// The failure matched `rule` and the budget allows another attempt.
    RetryAfter {
        delay: Duration,
        rule: &'a TransientErrorRule,
    },
    /// No rule matched; fail without retrying.
    Permanent,
    /// The failure matched `rule` but this was the final allowed attempt.
    Exhausted { rule: &'a TransientErrorRule },
}

/// A value produced by a retried operation, with the attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Runs fallible operations, retrying only failures whose text matches one
/// of its transient rules.
///
/// Rules are owned by the matcher, so independent runs can carry independent
/// rule sets.
#[derive(Debug, Clone)]
pub struct RetryableErrorMatcher {
    rules: Vec<TransientErrorRule>,
    policy: RetryPolicy,
}

impl RetryableErrorMatcher {
    pub const fn new(rules: Vec<TransientErrorRule>, policy: RetryPolicy) -> Self {
        Self { rules, policy }
    }

    pub fn rules(&self) -> &[TransientErrorRule] {
        &self.rules
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// First rule, in declaration order, whose pattern matches `message`.
    pub fn matching_rule(&self, message: &str) -> Option<&TransientErrorRule> {
        self.rules.iter().find(|rule| rule.is_match(message))
    }

    /// Decide the follow-up to attempt number `attempt` (1-based) failing with
    /// `message`.
    pub fn decide(&self, attempt: u32, message: &str) -> RetryDecision<'_> {
        match self.matching_rule(message) {
            None => RetryDecision::Permanent,
            Some(rule) if self.policy.has_attempts_after(attempt) => RetryDecision::RetryAfter {
                delay: self.policy.delay,
                rule,
            },
            Some(rule) => RetryDecision::Exhausted { rule },
        }
    }

    /// Run `op`, blocking the current thread between attempts.
    pub fn run<T, E, F>(&self, op: F) -> Result<Attempted<T>, RetryError<E>>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        self.run_with(&mut ThreadSleeper, op)
    }

    /// Run `op`, pausing through `sleeper` between attempts.
    pub fn run_with<T, E, F>(
        &self,
        sleeper: &mut impl Sleeper,
        mut op: F,
    ) -> Result<Attempted<T>, RetryError<E>>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            let err = match op() {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) => err,
            };
            let delay = self.settle(attempt, err)?;
            sleeper.sleep(delay);
            attempt += 1;
        }
    }

    /// Run the future produced by `op`, yielding to the runtime between
    /// attempts.
    pub async fn run_async<T, E, F, Fut>(&self, mut op: F) -> Result<Attempted<T>, RetryError<E>>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) => err,
            };
            let delay = self.settle(attempt, err)?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    // Classify a failed attempt: the delay before the next one, or the
    // terminal error.
    fn settle<E: Display>(&self, attempt: u32, err: E) -> Result<Duration, RetryError<E>> {
        let message = err.to_string();
        match self.decide(attempt, &message) {
            RetryDecision::RetryAfter { delay, rule } => {
                warn!(
                    attempt,
                    max_attempts = self.policy.max_attempts.get(),
                    rule = rule.description(),
                    "transient error, retrying in {delay:?}: {message}"
                );
                Ok(delay)
            }
            RetryDecision::Exhausted { rule } => {
                warn!(
                    attempt,
                    rule = rule.description(),
                    "transient error on final attempt: {message}"
                );
                Err(RetryError::Exhausted {
                    attempts: attempt,
                    rule: rule.description().to_string(),
                    last_error: err,
                })
            }
            RetryDecision::Permanent => {
                debug!(attempt, "error matched no transient rule: {message}");
                Err(RetryError::Permanent {
                    attempts: attempt,
                    last_error: err,
                })
            }
        }
    }
}
