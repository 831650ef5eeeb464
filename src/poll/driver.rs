use std::future::Future;

use tracing::debug;

use super::state::{ConditionPoller, Progress};
use crate::error::PollError;
use crate::policy::{PollPolicy, Sleeper, ThreadSleeper};

/// Poll `check` until it reports done, blocking the thread between checks.
///
/// `check` returns `Ok(true)` while the condition is still pending. On
/// success the number of checks made is returned.
pub fn poll<E, F>(policy: PollPolicy, check: F) -> Result<u32, PollError<E>>
where
    F: FnMut() -> Result<bool, E>,
{
    poll_with(policy, &mut ThreadSleeper, check)
}

/// Like [`poll`], pausing through `sleeper`.
pub fn poll_with<E, F>(
    policy: PollPolicy,
    sleeper: &mut impl Sleeper,
    mut check: F,
) -> Result<u32, PollError<E>>
where
    F: FnMut() -> Result<bool, E>,
{
    let mut poller = ConditionPoller::new(policy);
    loop {
        match poller.advance(check()) {
            Progress::Wait(interval) => {
                debug!(attempt = poller.attempts(), "condition pending, next check in {interval:?}");
                sleeper.sleep(interval);
            }
            Progress::Done(result) => return result,
        }
    }
}

/// Async counterpart of [`poll`] for use inside a runtime.
pub async fn poll_async<E, F, Fut>(policy: PollPolicy, mut check: F) -> Result<u32, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut poller = ConditionPoller::new(policy);
    loop {
        match poller.advance(check().await) {
            Progress::Wait(interval) => {
                debug!(attempt = poller.attempts(), "condition pending, next check in {interval:?}");
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
            }
            Progress::Done(result) => return result,
        }
    }
}
