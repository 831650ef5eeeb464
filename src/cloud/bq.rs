use serde_json::Value;

use super::command::CommandRunner;
use crate::error::VerifyError;

/// Runs validation queries through the `bq` CLI.
pub struct Bq<'a, R> {
    runner: &'a R,
    project: String,
}

impl<'a, R: CommandRunner> Bq<'a, R> {
    pub fn new(runner: &'a R, project: impl Into<String>) -> Self {
        Self {
            runner,
            project: project.into(),
        }
    }

    /// Number of rows in `table` (`dataset.table`, qualified with the project).
    pub async fn row_count(&self, table: &str) -> Result<i64, VerifyError> {
        let query = format!("SELECT count(*) AS count FROM `{}.{table}`;", self.project);
        let args = [
            format!("--project_id={}", self.project),
            "--format=json".to_string(),
            "query".to_string(),
            "--nouse_legacy_sql".to_string(),
            query,
        ];
        let stdout = self.runner.run("bq", &args).await?;
        parse_count(&stdout)
    }
}

// bq renders INT64 columns as JSON strings: `[{"count":"42"}]`.
fn parse_count(stdout: &str) -> Result<i64, VerifyError> {
    let rows: Vec<Value> = serde_json::from_str(stdout.trim())?;
    let count = rows
        .first()
        .and_then(|row| row.get("count"))
        .ok_or_else(|| VerifyError::output("bq", format!("no count column in `{}`", stdout.trim())))?;

    match count {
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|e| VerifyError::output("bq", format!("invalid count `{s}`: {e}"))),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| VerifyError::output("bq", format!("invalid count `{n}`"))),
        other => Err(VerifyError::output("bq", format!("invalid count `{other}`"))),
    }
}
