use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use super::error::WorkflowsApiError;
use super::types::{Execution, ExecutionList};
use crate::error::VerifyError;
use crate::workflow::WorkflowStatusSource;

const API_URL: &str = "https://workflowexecutions.googleapis.com";

/// Reads workflow executions from the Workflow Executions REST API.
pub struct WorkflowsApi {
    client: Client,
    base_url: String,
    token: String,
    project: String,
    region: String,
}

impl WorkflowsApi {
    pub fn new(
        token: String,
        project: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, WorkflowsApiError> {
        Self::with_base_url(token, project, region, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        token: String,
        project: impl Into<String>,
        region: impl Into<String>,
        base_url: String,
    ) -> Result<Self, WorkflowsApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            project: project.into(),
            region: region.into(),
        })
    }

    /// Most recently started execution of `workflow`.
    pub async fn list_latest(&self, workflow: &str) -> Result<Option<Execution>, WorkflowsApiError> {
        let url = format!(
            "{}/v1/projects/{}/locations/{}/workflows/{workflow}/executions",
            self.base_url, self.project, self.region
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("pageSize", "1"), ("orderBy", "startTime desc")])
            .send()
            .await?;
        let list = check_status(response).await?.json::<ExecutionList>().await?;
        Ok(list.executions.into_iter().next())
    }

    /// Raw JSON of one execution, by full resource name.
    pub async fn get(&self, execution: &str) -> Result<String, WorkflowsApiError> {
        let url = format!("{}/v1/{}", self.base_url, execution.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check_status(response).await?.text().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, WorkflowsApiError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(1000);
        return Err(WorkflowsApiError::RateLimited {
            retry_after_ms: retry_after,
        });
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(WorkflowsApiError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

impl WorkflowStatusSource for WorkflowsApi {
    async fn latest_execution(&self, workflow: &str) -> Result<Option<Execution>, VerifyError> {
        Ok(self.list_latest(workflow).await?)
    }

    async fn describe_execution(&self, execution: &str) -> Result<String, VerifyError> {
        Ok(self.get(execution).await?)
    }
}
