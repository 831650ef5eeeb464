mod driver;
mod state;

pub use driver::{poll, poll_async, poll_with};
pub use state::{ConditionPoller, PollState, PollStep};
