use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use blueprint_verify::cli::{Cli, Command};
use blueprint_verify::cloud::{SystemRunner, TerraformCommand};
use blueprint_verify::config::{VerifyConfig, WorkflowConfig};
use blueprint_verify::policy::PollPolicy;
use blueprint_verify::report::VerificationReport;
use blueprint_verify::ui::RunProgress;
use blueprint_verify::verifier::BlueprintVerifier;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = VerifyConfig::load(cli.config.as_deref()).context("configuration error")?;
    cli.apply_overrides(&mut config);

    let verifier = BlueprintVerifier::new(SystemRunner, config);

    match cli.command {
        Command::Init => provision(&verifier, TerraformCommand::Init).await,
        Command::Apply => provision(&verifier, TerraformCommand::Apply).await,
        Command::Teardown => provision(&verifier, TerraformCommand::Destroy).await,
        Command::Verify => {
            let progress = RunProgress::start("VERIFY");
            let mut report = VerificationReport::new();
            let result = verifier.verify(&mut report).await;
            report.finish(result.as_ref().map(|_| ()));
            progress.complete(&report);
            progress.print_report(&report);
            Ok(result?)
        }
        Command::Test => {
            let progress = RunProgress::start("blueprint test");
            let (report, result) = verifier.run_test(|stage| progress.stage(stage)).await;
            progress.complete(&report);
            progress.print_report(&report);
            Ok(result?)
        }
        Command::Poll { workflow } => {
            let workflow = verifier
                .config()
                .workflow(&workflow)
                .cloned()
                .unwrap_or_else(|| {
                    let policy = PollPolicy::default();
                    WorkflowConfig {
                        name: workflow,
                        max_attempts: policy.max_attempts,
                        interval_secs: policy.interval.as_secs(),
                    }
                });
            let progress = RunProgress::start(&format!("polling {}", workflow.name));
            let project = verifier.project_id().await?;
            let source = verifier.status_source(&project).await?;
            match verifier.wait_for_workflow(&source, &workflow).await {
                Ok(checks) => {
                    progress.finish(true, &format!("{} succeeded after {checks} checks", workflow.name));
                    Ok(())
                }
                Err(err) => {
                    progress.finish(false, &err.to_string());
                    Err(err.into())
                }
            }
        }
        Command::Match { message } => {
            let matcher = verifier.config().retry.matcher();
            match matcher.matching_rule(&message) {
                Some(rule) => println!("transient: {rule}"),
                None => println!("permanent: no rule matches"),
            }
            Ok(())
        }
    }
}

async fn provision(
    verifier: &BlueprintVerifier<SystemRunner>,
    command: TerraformCommand,
) -> Result<()> {
    let progress = RunProgress::start(&format!("terraform {command}"));
    match verifier.provision(command).await {
        Ok(attempts) => {
            progress.finish(true, &format!("terraform {command} complete ({attempts} attempts)"));
            Ok(())
        }
        Err(err) => {
            progress.finish(false, &err.to_string());
            Err(err.into())
        }
    }
}
