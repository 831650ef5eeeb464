use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cloud::Execution;
use crate::error::VerifyError;

/// Coarse state of the most recent execution of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowExecutionState {
    Succeeded,
    Failed,
    Pending,
}

impl WorkflowExecutionState {
    /// Map the API's execution state. Anything not finished, including an
    /// unknown state, counts as pending.
    pub fn from_api(state: &str) -> Self {
        match state {
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" | "CANCELLED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for WorkflowExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowExecutionState::Succeeded => write!(f, "SUCCEEDED"),
            WorkflowExecutionState::Failed => write!(f, "FAILED"),
            WorkflowExecutionState::Pending => write!(f, "PENDING"),
        }
    }
}

/// Somewhere the latest execution of a workflow can be looked up.
pub trait WorkflowStatusSource {
    /// Most recently started execution, or `None` if it has not run yet.
    async fn latest_execution(&self, workflow: &str) -> Result<Option<Execution>, VerifyError>;

    /// Full description of one execution, for failure reports.
    async fn describe_execution(&self, execution: &str) -> Result<String, VerifyError>;
}

/// One poll check for `workflow`: `Ok(true)` while it is still running,
/// `Ok(false)` once it succeeded.
///
/// A failed execution is a hard error carrying the execution's description,
/// so the poller stops instead of waiting out its budget.
pub async fn check_workflow(
    source: &impl WorkflowStatusSource,
    workflow: &str,
) -> Result<bool, VerifyError> {
    let Some(execution) = source.latest_execution(workflow).await? else {
        info!(workflow, "no executions yet");
        return Ok(true);
    };

    match WorkflowExecutionState::from_api(&execution.state) {
        WorkflowExecutionState::Succeeded => {
            info!(workflow, execution = %execution.name, "workflow succeeded");
            Ok(false)
        }
        WorkflowExecutionState::Pending => {
            info!(workflow, state = %execution.state, "workflow still running");
            Ok(true)
        }
        WorkflowExecutionState::Failed => {
            warn!(workflow, execution = %execution.name, state = %execution.state, "workflow failed");
            let detail = match source.describe_execution(&execution.name).await {
                Ok(detail) => detail,
                Err(err) => {
                    warn!("could not describe execution {}: {err}", execution.name);
                    execution
                        .error
                        .map(|e| format!("{} ({})", e.payload, e.context))
                        .unwrap_or_else(|| execution.state.clone())
                }
            };
            Err(VerifyError::WorkflowFailed {
                workflow: workflow.to_string(),
                execution: execution.name,
                detail,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::cloud::ExecutionError;

    /// Hands out a scripted sequence of execution states.
    #[derive(Debug, Default)]
    pub struct ScriptedSource {
        states: RefCell<VecDeque<Option<&'static str>>>,
        error: Option<ExecutionError>,
        describe_fails: bool,
        pub describes: RefCell<u32>,
    }

    impl ScriptedSource {
        pub fn new(states: &[Option<&'static str>]) -> Self {
            Self {
                states: RefCell::new(states.iter().copied().collect()),
                ..Self::default()
            }
        }

        /// Attach an error payload to every execution handed out.
        pub fn with_error(mut self, payload: &str, context: &str) -> Self {
            self.error = Some(ExecutionError {
                payload: payload.to_string(),
                context: context.to_string(),
            });
            self
        }

        /// Make `describe_execution` fail.
        pub fn failing_describe(mut self) -> Self {
            self.describe_fails = true;
            self
        }
    }

    impl WorkflowStatusSource for ScriptedSource {
        async fn latest_execution(&self, workflow: &str) -> Result<Option<Execution>, VerifyError> {
            let next = self.states.borrow_mut().pop_front().flatten();
            Ok(next.map(|state| Execution {
                name: format!("projects/p/locations/l/workflows/{workflow}/executions/e1"),
                state: state.to_string(),
                start_time: None,
                end_time: None,
                error: self.error.clone(),
            }))
        }

        async fn describe_execution(&self, execution: &str) -> Result<String, VerifyError> {
            *self.describes.borrow_mut() += 1;
            if self.describe_fails {
                return Err(VerifyError::output("gcloud", "permission denied on describe"));
            }
            Ok(format!("{execution}: step copy_tables raised HTTP 403"))
        }
    }
}
