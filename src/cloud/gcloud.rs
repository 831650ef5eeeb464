use super::command::CommandRunner;
use super::types::Execution;
use crate::error::VerifyError;
use crate::workflow::WorkflowStatusSource;

/// Looks up workflow executions through the `gcloud` CLI.
pub struct GcloudWorkflows<'a, R> {
    runner: &'a R,
    project: String,
    region: String,
}

impl<'a, R: CommandRunner> GcloudWorkflows<'a, R> {
    pub fn new(runner: &'a R, project: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            runner,
            project: project.into(),
            region: region.into(),
        }
    }
}

impl<R: CommandRunner> WorkflowStatusSource for GcloudWorkflows<'_, R> {
    async fn latest_execution(&self, workflow: &str) -> Result<Option<Execution>, VerifyError> {
        let args = [
            "workflows",
            "executions",
            "list",
            workflow,
            "--project",
            self.project.as_str(),
            "--location",
            self.region.as_str(),
            "--sort-by=~startTime",
            "--limit=1",
            "--format=json",
        ]
        .map(str::to_string);
        let stdout = self.runner.run("gcloud", &args).await?;
        let executions: Vec<Execution> = serde_json::from_str(&stdout)?;
        Ok(executions.into_iter().next())
    }

    async fn describe_execution(&self, execution: &str) -> Result<String, VerifyError> {
        let args = ["workflows", "executions", "describe", execution, "--format=json"]
            .map(str::to_string);
        Ok(self.runner.run("gcloud", &args).await?)
    }
}

/// Fetch an OAuth access token for the active gcloud account.
pub async fn print_access_token(runner: &impl CommandRunner) -> Result<String, VerifyError> {
    let args = ["auth", "print-access-token"].map(str::to_string);
    let token = runner.run("gcloud", &args).await?.trim().to_string();
    if token.is_empty() {
        return Err(VerifyError::output("gcloud", "empty access token"));
    }
    Ok(token)
}
