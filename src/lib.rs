//! Integration-test harness for data-warehouse infrastructure blueprints.
//!
//! Two reusable primitives sit at the core: [`retry::RetryableErrorMatcher`]
//! retries an operation while its error matches a known transient pattern,
//! and [`poll::ConditionPoller`] polls a condition under a fixed attempt
//! budget. [`verifier::BlueprintVerifier`] drives a blueprint through
//! terraform, waits for its workflows and checks that its tables hold data.

pub mod cli;
pub mod cloud;
pub mod config;
pub mod error;
pub mod policy;
pub mod poll;
pub mod report;
pub mod retry;
pub mod ui;
pub mod verifier;
pub mod workflow;
