use tracing::{error, info, warn};

use crate::cloud::{
    Bq, CommandRunner, GcloudWorkflows, Terraform, TerraformCommand, WorkflowsApi,
    print_access_token,
};
use crate::config::{StatusBackend, VerifyConfig, WorkflowConfig};
use crate::error::{PollError, VerifyError};
use crate::poll::{PollState, poll_async};
use crate::report::{Stage, VerificationReport};
use crate::retry::RetryableErrorMatcher;
use crate::workflow::{WorkflowStatusSource, check_workflow};

/// Either workflow status backend, chosen from configuration.
pub enum StatusSource<'a, R> {
    Gcloud(GcloudWorkflows<'a, R>),
    Api(WorkflowsApi),
}

impl<R: CommandRunner> WorkflowStatusSource for StatusSource<'_, R> {
    async fn latest_execution(
        &self,
        workflow: &str,
    ) -> Result<Option<crate::cloud::Execution>, VerifyError> {
        match self {
            StatusSource::Gcloud(source) => source.latest_execution(workflow).await,
            StatusSource::Api(source) => source.latest_execution(workflow).await,
        }
    }

    async fn describe_execution(&self, execution: &str) -> Result<String, VerifyError> {
        match self {
            StatusSource::Gcloud(source) => source.describe_execution(execution).await,
            StatusSource::Api(source) => source.describe_execution(execution).await,
        }
    }
}

/// Drives a blueprint through init, apply, verify and teardown.
pub struct BlueprintVerifier<R> {
    runner: R,
    config: VerifyConfig,
    matcher: RetryableErrorMatcher,
}

impl<R: CommandRunner> BlueprintVerifier<R> {
    pub fn new(runner: R, config: VerifyConfig) -> Self {
        let matcher = config.retry.matcher();
        Self {
            runner,
            config,
            matcher,
        }
    }

    pub const fn config(&self) -> &VerifyConfig {
        &self.config
    }

    pub const fn runner(&self) -> &R {
        &self.runner
    }

    fn terraform(&self) -> Terraform<'_, R> {
        Terraform::new(&self.runner, &self.config.terraform_dir)
    }

    /// Run one terraform command under the transient-error matcher,
    /// returning the attempts it took.
    pub async fn provision(&self, command: TerraformCommand) -> Result<u32, VerifyError> {
        let terraform = self.terraform();
        info!(dir = %terraform.dir().display(), "terraform {command}");
        let done = self
            .matcher
            .run_async(|| terraform.run(command))
            .await
            .map_err(|source| VerifyError::Provision {
                stage: command.name(),
                source,
            })?;
        info!(attempts = done.attempts, "terraform {command} complete");
        Ok(done.attempts)
    }

    /// The project under test: configured, or read from terraform outputs.
    pub async fn project_id(&self) -> Result<String, VerifyError> {
        if let Some(project) = &self.config.project_id {
            return Ok(project.clone());
        }
        self.terraform().output_string("project_id").await
    }

    /// Build the configured workflow status backend for `project`.
    pub async fn status_source(&self, project: &str) -> Result<StatusSource<'_, R>, VerifyError> {
        match self.config.backend {
            StatusBackend::Gcloud => Ok(StatusSource::Gcloud(GcloudWorkflows::new(
                &self.runner,
                project,
                &self.config.region,
            ))),
            StatusBackend::Api => {
                let token = match &self.config.access_token {
                    Some(token) => token.clone(),
                    None => print_access_token(&self.runner).await?,
                };
                let api = match &self.config.api_base_url {
                    Some(base) => {
                        WorkflowsApi::with_base_url(token, project, &self.config.region, base.clone())?
                    }
                    None => WorkflowsApi::new(token, project, &self.config.region)?,
                };
                Ok(StatusSource::Api(api))
            }
        }
    }

    /// Poll one workflow until its latest execution succeeds.
    ///
    /// A failed execution or a failed status lookup ends polling at once with
    /// [`VerifyError::WorkflowCheck`] naming the check it happened on; a
    /// workflow still running when the budget is spent yields
    /// [`VerifyError::WorkflowTimeout`].
    pub async fn wait_for_workflow(
        &self,
        source: &impl WorkflowStatusSource,
        workflow: &WorkflowConfig,
    ) -> Result<u32, VerifyError> {
        let policy = workflow.policy();
        info!(
            workflow = %workflow.name,
            max_attempts = policy.max_attempts.get(),
            "waiting for workflow (up to {:?})",
            policy.deadline()
        );
        poll_async(policy, || check_workflow(source, &workflow.name))
            .await
            .map_err(|err| match err {
                PollError::Timeout { attempts, interval } => VerifyError::WorkflowTimeout {
                    workflow: workflow.name.clone(),
                    attempts,
                    interval,
                },
                PollError::Check { attempt, error } => VerifyError::WorkflowCheck {
                    workflow: workflow.name.clone(),
                    attempt,
                    source: Box::new(error),
                },
            })
    }

    /// Count rows in every configured table; fails listing all empty ones.
    pub async fn validate_tables(
        &self,
        project: &str,
        report: &mut VerificationReport,
    ) -> Result<(), VerifyError> {
        let bq = Bq::new(&self.runner, project);
        let mut empty = Vec::new();
        for table in &self.config.tables {
            let rows = bq.row_count(table).await?;
            info!(table, rows, "table row count");
            report.record_table(table, rows);
            if rows <= 0 {
                warn!(table, "table is empty");
                empty.push(table.clone());
            }
        }
        if empty.is_empty() {
            Ok(())
        } else {
            Err(VerifyError::EmptyTables(empty))
        }
    }

    /// Wait for every workflow in order, then validate the tables.
    pub async fn verify(&self, report: &mut VerificationReport) -> Result<(), VerifyError> {
        let project = self.project_id().await?;
        info!(project = %project, "verifying blueprint");
        report.project_id = Some(project.clone());

        let source = self.status_source(&project).await?;
        for workflow in &self.config.workflows {
            match self.wait_for_workflow(&source, workflow).await {
                Ok(checks) => report.record_workflow(&workflow.name, PollState::Succeeded, checks),
                Err(err) => {
                    let state = match &err {
                        VerifyError::WorkflowTimeout { .. } => PollState::TimedOut,
                        _ => PollState::Failed,
                    };
                    let checks = err.workflow_checks().unwrap_or_default();
                    report.record_workflow(&workflow.name, state, checks);
                    return Err(err);
                }
            }
        }

        self.validate_tables(&project, report).await
    }

    /// Full run: init, apply, verify, then teardown whenever apply was
    /// attempted. The first failure is the run's result; a teardown failure
    /// after an earlier one is only recorded.
    pub async fn run_test(
        &self,
        mut on_stage: impl FnMut(Stage),
    ) -> (VerificationReport, Result<(), VerifyError>) {
        let mut report = VerificationReport::new();

        on_stage(Stage::Init);
        if let Err(err) = self.run_stage(Stage::Init, TerraformCommand::Init, &mut report).await {
            report.finish(Err(&err));
            return (report, Err(err));
        }

        on_stage(Stage::Apply);
        let mut result = self.run_stage(Stage::Apply, TerraformCommand::Apply, &mut report).await;

        if result.is_ok() {
            on_stage(Stage::Verify);
            result = self.verify(&mut report).await;
            report.record_stage(Stage::Verify, 1, result.as_ref().map(|_| ()));
        }

        on_stage(Stage::Teardown);
        let teardown = self
            .run_stage(Stage::Teardown, TerraformCommand::Destroy, &mut report)
            .await;
        if let Err(err) = teardown {
            if result.is_ok() {
                result = Err(err);
            } else {
                error!("teardown after failed run also failed: {err}");
            }
        }

        report.finish(result.as_ref().map(|_| ()));
        (report, result)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        command: TerraformCommand,
        report: &mut VerificationReport,
    ) -> Result<(), VerifyError> {
        match self.provision(command).await {
            Ok(attempts) => {
                report.record_stage::<VerifyError>(stage, attempts, Ok(()));
                Ok(())
            }
            Err(err) => {
                let attempts = match &err {
                    VerifyError::Provision { source, .. } => source.attempts(),
                    _ => 0,
                };
                report.record_stage(stage, attempts, Err(&err));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::cloud::command::testing::ScriptedRunner;
    use crate::config::RetryConfig;
    use crate::report::RunStatus;
    use crate::retry::TransientErrorRule;
    use crate::workflow::testing::ScriptedSource;

    fn config() -> VerifyConfig {
        VerifyConfig {
            project_id: Some("dwh-1".into()),
            retry: RetryConfig {
                max_attempts: NonZeroU32::new(3).unwrap(),
                delay_secs: 0,
                rules: vec![TransientErrorRule::new("quota exceeded", "transient quota").unwrap()],
            },
            workflows: vec![WorkflowConfig {
                name: "copy-data".into(),
                max_attempts: NonZeroU32::new(3).unwrap(),
                interval_secs: 0,
            }],
            tables: vec!["ds.orders".into(), "ds.users".into()],
            ..Default::default()
        }
    }

    const LIST: &str = "executions list copy-data";
    const ACTIVE: &str = r#"[{"name": "projects/dwh-1/locations/us-central1/workflows/copy-data/executions/e1", "state": "ACTIVE"}]"#;
    const SUCCEEDED: &str = r#"[{"name": "projects/dwh-1/locations/us-central1/workflows/copy-data/executions/e1", "state": "SUCCEEDED"}]"#;
    const FAILED: &str = r#"[{"name": "projects/dwh-1/locations/us-central1/workflows/copy-data/executions/e1", "state": "FAILED"}]"#;

    #[tokio::test]
    async fn provision_retries_transient_errors() {
        let runner = ScriptedRunner::new()
            .fail("apply", "googleapi: Error 429: quota exceeded")
            .fail("apply", "googleapi: Error 429: quota exceeded")
            .ok("apply", "Apply complete!");
        let verifier = BlueprintVerifier::new(runner, config());

        let attempts = verifier.provision(TerraformCommand::Apply).await.unwrap();
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn provision_fails_fast_on_permanent_error() {
        let runner = ScriptedRunner::new().fail("apply", "Error: Invalid provider configuration");
        let verifier = BlueprintVerifier::new(runner, config());

        let err = verifier.provision(TerraformCommand::Apply).await.unwrap_err();
        match err {
            VerifyError::Provision { stage, source } => {
                assert_eq!(stage, "apply");
                assert_eq!(source.attempts(), 1);
                assert!(source.matched_rule().is_none());
            }
            other => panic!("expected Provision, got {other:?}"),
        }
        assert_eq!(verifier.runner().remaining(), 0);
    }

    #[tokio::test]
    async fn project_id_falls_back_to_terraform_output() {
        let runner = ScriptedRunner::new().ok(
            "output -json",
            r#"{"project_id": {"value": "from-terraform"}}"#,
        );
        let verifier = BlueprintVerifier::new(
            runner,
            VerifyConfig {
                project_id: None,
                ..config()
            },
        );
        assert_eq!(verifier.project_id().await.unwrap(), "from-terraform");
    }

    #[tokio::test]
    async fn wait_for_workflow_polls_until_success() {
        let verifier = BlueprintVerifier::new(ScriptedRunner::new(), config());
        let source = ScriptedSource::new(&[None, Some("ACTIVE"), Some("SUCCEEDED")]);

        let checks = verifier
            .wait_for_workflow(&source, &verifier.config().workflows[0])
            .await
            .unwrap();
        assert_eq!(checks, 3);
    }

    #[tokio::test]
    async fn wait_for_workflow_times_out() {
        let verifier = BlueprintVerifier::new(ScriptedRunner::new(), config());
        let source = ScriptedSource::new(&[Some("ACTIVE"), Some("ACTIVE"), Some("ACTIVE")]);

        let err = verifier
            .wait_for_workflow(&source, &verifier.config().workflows[0])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::WorkflowTimeout { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn failed_workflow_stops_polling_immediately() {
        let verifier = BlueprintVerifier::new(ScriptedRunner::new(), config());
        let source = ScriptedSource::new(&[Some("ACTIVE"), Some("FAILED"), Some("SUCCEEDED")]);

        let err = verifier
            .wait_for_workflow(&source, &verifier.config().workflows[0])
            .await
            .unwrap_err();
        match err {
            VerifyError::WorkflowCheck {
                workflow,
                attempt,
                source: cause,
            } => {
                assert_eq!(workflow, "copy-data");
                assert_eq!(attempt, 2);
                assert!(matches!(*cause, VerifyError::WorkflowFailed { .. }));
            }
            other => panic!("expected WorkflowCheck, got {other:?}"),
        }
        assert_eq!(*source.describes.borrow(), 1);
    }

    #[tokio::test]
    async fn verify_records_the_check_a_workflow_failed_on() {
        let runner = ScriptedRunner::new()
            .ok(LIST, ACTIVE)
            .ok(LIST, FAILED)
            .ok("executions describe", r#"{"error": {"payload": "boom"}}"#);
        let verifier = BlueprintVerifier::new(runner, config());
        let mut report = VerificationReport::new();

        let err = verifier.verify(&mut report).await.unwrap_err();

        assert_eq!(err.workflow_checks(), Some(2));
        assert!(err.to_string().contains("check 2"));
        assert_eq!(report.workflows[0].state, PollState::Failed);
        assert_eq!(report.workflows[0].checks, 2);
        assert!(report.tables.is_empty());
    }

    #[tokio::test]
    async fn verify_records_checks_on_timeout() {
        let runner = ScriptedRunner::new()
            .ok(LIST, ACTIVE)
            .ok(LIST, ACTIVE)
            .ok(LIST, ACTIVE);
        let verifier = BlueprintVerifier::new(runner, config());
        let mut report = VerificationReport::new();

        let err = verifier.verify(&mut report).await.unwrap_err();

        assert!(matches!(err, VerifyError::WorkflowTimeout { attempts: 3, .. }));
        assert_eq!(report.workflows[0].state, PollState::TimedOut);
        assert_eq!(report.workflows[0].checks, 3);
    }

    #[tokio::test]
    async fn validate_tables_lists_every_empty_table() {
        let runner = ScriptedRunner::new()
            .ok("ds.orders", r#"[{"count":"0"}]"#)
            .ok("ds.users", r#"[{"count":"0"}]"#);
        let verifier = BlueprintVerifier::new(runner, config());
        let mut report = VerificationReport::new();

        let err = verifier.validate_tables("dwh-1", &mut report).await.unwrap_err();
        match err {
            VerifyError::EmptyTables(tables) => assert_eq!(tables, vec!["ds.orders", "ds.users"]),
            other => panic!("expected EmptyTables, got {other:?}"),
        }
        assert_eq!(report.tables.len(), 2);
    }

    #[tokio::test]
    async fn full_run_passes_and_tears_down() {
        let runner = ScriptedRunner::new()
            .ok("init", "")
            .fail("apply", "quota exceeded")
            .ok("apply", "Apply complete!")
            .ok(LIST, ACTIVE)
            .ok(LIST, SUCCEEDED)
            .ok("ds.orders", r#"[{"count":"12"}]"#)
            .ok("ds.users", r#"[{"count":"3"}]"#)
            .ok("destroy", "Destroy complete!");
        let verifier = BlueprintVerifier::new(runner, config());
        let mut stages = Vec::new();

        let (report, result) = verifier.run_test(|stage| stages.push(stage)).await;

        result.unwrap();
        assert_eq!(
            stages,
            vec![Stage::Init, Stage::Apply, Stage::Verify, Stage::Teardown]
        );
        assert_eq!(report.status, RunStatus::Passed);
        assert_eq!(report.project_id.as_deref(), Some("dwh-1"));
        assert_eq!(report.stage(Stage::Apply).unwrap().attempts, 2);
        assert_eq!(report.workflows[0].checks, 2);
        assert_eq!(report.tables.len(), 2);
        assert_eq!(verifier.runner().remaining(), 0);
    }

    #[tokio::test]
    async fn failed_workflow_still_tears_down() {
        let runner = ScriptedRunner::new()
            .ok("init", "")
            .ok("apply", "")
            .ok(LIST, FAILED)
            .ok("executions describe", r#"{"error": {"payload": "HTTP 403"}}"#)
            .ok("destroy", "");
        let verifier = BlueprintVerifier::new(runner, config());

        let (report, result) = verifier.run_test(|_| {}).await;

        assert!(matches!(
            result,
            Err(VerifyError::WorkflowCheck { attempt: 1, .. })
        ));
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.workflows[0].state, PollState::Failed);
        assert_eq!(report.workflows[0].checks, 1);
        assert!(report.stage(Stage::Teardown).unwrap().succeeded);
        assert!(report.tables.is_empty());
        assert_eq!(verifier.runner().remaining(), 0);
    }

    #[tokio::test]
    async fn failed_init_skips_remaining_stages() {
        let runner = ScriptedRunner::new().fail("init", "Error: Failed to query available provider packages");
        let verifier = BlueprintVerifier::new(runner, config());
        let mut stages = Vec::new();

        let (report, result) = verifier.run_test(|stage| stages.push(stage)).await;

        assert!(result.is_err());
        assert_eq!(stages, vec![Stage::Init]);
        assert_eq!(report.stages.len(), 1);
        assert_eq!(verifier.runner().calls().len(), 1);
    }

    #[tokio::test]
    async fn teardown_failure_fails_an_otherwise_passing_run() {
        let runner = ScriptedRunner::new()
            .ok("init", "")
            .ok("apply", "")
            .ok(LIST, SUCCEEDED)
            .ok("ds.orders", r#"[{"count":"1"}]"#)
            .ok("ds.users", r#"[{"count":"1"}]"#)
            .fail("destroy", "Error: deleting project: permission denied");
        let verifier = BlueprintVerifier::new(runner, config());

        let (report, result) = verifier.run_test(|_| {}).await;

        assert!(matches!(
            result,
            Err(VerifyError::Provision {
                stage: "destroy",
                ..
            })
        ));
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn api_backend_uses_gcloud_token_when_unset() {
        let runner = ScriptedRunner::new().ok("auth print-access-token", "ya29.abc\n");
        let verifier = BlueprintVerifier::new(
            runner,
            VerifyConfig {
                backend: StatusBackend::Api,
                ..config()
            },
        );
        let source = verifier.status_source("dwh-1").await.unwrap();
        assert!(matches!(source, StatusSource::Api(_)));
        assert_eq!(verifier.runner().calls(), vec!["gcloud auth print-access-token"]);
    }
}
