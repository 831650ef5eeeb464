use tokio::process::Command;
use tracing::debug;

use super::error::CommandError;

/// Runs an external tool and returns its stdout.
///
/// A non-zero exit becomes [`CommandError::Failed`] carrying stderr, which is
/// what transient-error rules are matched against.
pub trait CommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError>;
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        debug!("running {program} {}", args.join(" "));
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
