mod matcher;
mod rule;

pub use matcher::{Attempted, RetryDecision, RetryableErrorMatcher};
pub use rule::{RuleSpec, TransientErrorRule};
