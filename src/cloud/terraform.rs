use std::fmt;
use std::path::{Path, PathBuf};

use super::command::CommandRunner;
use super::error::CommandError;
use super::types::TerraformOutputs;
use crate::error::VerifyError;

/// Terraform commands that change or prepare infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerraformCommand {
    Init,
    Apply,
    Destroy,
}

impl TerraformCommand {
    pub const fn name(self) -> &'static str {
        match self {
            TerraformCommand::Init => "init",
            TerraformCommand::Apply => "apply",
            TerraformCommand::Destroy => "destroy",
        }
    }

    fn flags(self) -> &'static [&'static str] {
        match self {
            TerraformCommand::Init => &["-input=false", "-no-color"],
            TerraformCommand::Apply | TerraformCommand::Destroy => {
                &["-auto-approve", "-input=false", "-no-color"]
            }
        }
    }
}

impl fmt::Display for TerraformCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Thin wrapper over the `terraform` CLI for one configuration directory.
pub struct Terraform<'a, R> {
    runner: &'a R,
    dir: PathBuf,
}

impl<'a, R: CommandRunner> Terraform<'a, R> {
    pub fn new(runner: &'a R, dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn args(&self, command: &str, flags: &[&str]) -> Vec<String> {
        let mut args = vec![format!("-chdir={}", self.dir.display()), command.to_string()];
        args.extend(flags.iter().map(|f| (*f).to_string()));
        args
    }

    /// Run `command`, returning terraform's stdout.
    pub async fn run(&self, command: TerraformCommand) -> Result<String, CommandError> {
        self.runner
            .run("terraform", &self.args(command.name(), command.flags()))
            .await
    }

    /// Parse `terraform output -json`.
    pub async fn outputs(&self) -> Result<TerraformOutputs, VerifyError> {
        let stdout = self
            .runner
            .run("terraform", &self.args("output", &["-json"]))
            .await?;
        Ok(serde_json::from_str(&stdout)?)
    }

    /// Read a single string-valued output.
    pub async fn output_string(&self, name: &str) -> Result<String, VerifyError> {
        let outputs = self.outputs().await?;
        let output = outputs
            .get(name)
            .ok_or_else(|| VerifyError::output("terraform", format!("no output named `{name}`")))?;
        output
            .value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| VerifyError::output("terraform", format!("output `{name}` is not a string")))
    }
}
