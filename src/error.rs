use std::time::Duration;

use thiserror::Error;

use crate::cloud::{CommandError, WorkflowsApiError};

/// A transient-error pattern that failed to compile.
#[derive(Debug, Error)]
#[error("invalid transient error pattern `{pattern}`: {source}")]
pub struct RuleError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Terminal failure of an operation run through a
/// [`RetryableErrorMatcher`](crate::retry::RetryableErrorMatcher).
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// No transient rule matched, so the operation was not retried.
    #[error("permanent error after {attempts} attempt(s): {last_error}")]
    Permanent { attempts: u32, last_error: E },

    /// Every allowed attempt failed with an error matching a transient rule.
    #[error("retries exhausted after {attempts} attempt(s) (last matched rule: {rule}): {last_error}")]
    Exhausted {
        attempts: u32,
        rule: String,
        last_error: E,
    },
}

impl<E> RetryError<E> {
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Description of the rule that matched the last failure, if any.
    pub fn matched_rule(&self) -> Option<&str> {
        match self {
            Self::Permanent { .. } => None,
            Self::Exhausted { rule, .. } => Some(rule),
        }
    }

    pub const fn last_error(&self) -> &E {
        match self {
            Self::Permanent { last_error, .. } | Self::Exhausted { last_error, .. } => last_error,
        }
    }

    pub fn into_last_error(self) -> E {
        match self {
            Self::Permanent { last_error, .. } | Self::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Terminal failure of a [`ConditionPoller`](crate::poll::ConditionPoller).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError<E> {
    /// The condition was still pending when the attempt budget ran out.
    #[error("condition still pending after {attempts} attempt(s) at {interval:?} intervals")]
    Timeout { attempts: u32, interval: Duration },

    /// The check itself failed; polling stopped at that attempt.
    #[error("check failed on attempt {attempt}: {error}")]
    Check { attempt: u32, error: E },
}

impl<E> PollError<E> {
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. } => *attempts,
            Self::Check { attempt, .. } => *attempt,
        }
    }

    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors raised by the blueprint verification stages.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("terraform {stage} failed: {source}")]
    Provision {
        stage: &'static str,
        #[source]
        source: RetryError<CommandError>,
    },

    #[error("workflow {workflow} execution {execution} failed: {detail}")]
    WorkflowFailed {
        workflow: String,
        execution: String,
        detail: String,
    },

    /// A workflow status check failed on check number `attempt`; polling
    /// stopped there.
    #[error("workflow {workflow} check {attempt} failed: {source}")]
    WorkflowCheck {
        workflow: String,
        attempt: u32,
        #[source]
        source: Box<VerifyError>,
    },

    #[error("workflow {workflow} still pending after {attempts} check(s) at {interval:?} intervals")]
    WorkflowTimeout {
        workflow: String,
        attempts: u32,
        interval: Duration,
    },

    #[error("tables with no rows: {}", .0.join(", "))]
    EmptyTables(Vec<String>),

    #[error("unexpected {tool} output: {message}")]
    Output { tool: &'static str, message: String },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Workflows API error: {0}")]
    WorkflowsApi(#[from] WorkflowsApiError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VerifyError {
    /// Output parse failure for the named external tool.
    pub fn output(tool: &'static str, message: impl Into<String>) -> Self {
        Self::Output {
            tool,
            message: message.into(),
        }
    }

    /// Status checks made before waiting on a workflow ended in this error.
    pub const fn workflow_checks(&self) -> Option<u32> {
        match self {
            Self::WorkflowCheck { attempt, .. } => Some(*attempt),
            Self::WorkflowTimeout { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
