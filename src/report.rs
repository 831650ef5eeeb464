use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::poll::PollState;

/// A stage of a blueprint test run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Init,
    Apply,
    Verify,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => write!(f, "INIT"),
            Stage::Apply => write!(f, "APPLY"),
            Stage::Verify => write!(f, "VERIFY"),
            Stage::Teardown => write!(f, "TEARDOWN"),
        }
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub attempts: u32,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub workflow: String,
    pub state: PollState,
    pub checks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub table: String,
    pub rows: i64,
}

/// Structured record of one verification run, printed at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub project_id: Option<String>,
    pub stages: Vec<StageRecord>,
    pub workflows: Vec<WorkflowRecord>,
    pub tables: Vec<TableRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
}

impl Default for VerificationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Running,
            project_id: None,
            stages: Vec::new(),
            workflows: Vec::new(),
            tables: Vec::new(),
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: 0,
        }
    }

    pub fn record_stage<E: fmt::Display>(&mut self, stage: Stage, attempts: u32, result: Result<(), &E>) {
        self.stages.push(StageRecord {
            stage,
            attempts,
            succeeded: result.is_ok(),
            error: result.err().map(ToString::to_string),
        });
    }

    pub fn record_workflow(&mut self, workflow: &str, state: PollState, checks: u32) {
        self.workflows.push(WorkflowRecord {
            workflow: workflow.to_string(),
            state,
            checks,
        });
    }

    pub fn record_table(&mut self, table: &str, rows: i64) {
        self.tables.push(TableRecord {
            table: table.to_string(),
            rows,
        });
    }

    /// Close the report with the run's final result.
    pub fn finish<E: fmt::Display>(&mut self, result: Result<(), &E>) {
        let now = Utc::now();
        self.status = if result.is_ok() {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
        self.error = result.err().map(ToString::to_string);
        self.completed_at = Some(now);
        self.duration_ms = (now - self.started_at).num_milliseconds();
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_report_is_running() {
        let report = VerificationReport::new();
        assert_eq!(report.status, RunStatus::Running);
        assert!(report.completed_at.is_none());
        assert!(report.stages.is_empty());
    }

    #[test]
    fn finish_with_error_marks_failed() {
        let mut report = VerificationReport::new();
        report.record_stage::<String>(Stage::Apply, 3, Ok(()));
        report.finish(Err(&"tables with no rows: ds.t"));

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("tables with no rows: ds.t"));
        assert!(report.completed_at.is_some());
        assert!(report.duration_ms >= 0);
        assert_eq!(report.stage(Stage::Apply).unwrap().attempts, 3);
    }

    #[test]
    fn stage_error_is_recorded() {
        let mut report = VerificationReport::new();
        report.record_stage(Stage::Init, 1, Err(&"terraform not found"));
        let record = report.stage(Stage::Init).unwrap();
        assert!(!record.succeeded);
        assert_eq!(record.error.as_deref(), Some("terraform not found"));
    }

    #[test]
    fn serializes_without_empty_error() {
        let mut report = VerificationReport::new();
        report.record_workflow("copy-data", PollState::Succeeded, 4);
        report.record_table("ds.t", 10);
        report.finish::<String>(Ok(()));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "Passed");
        assert!(json.get("error").is_none());
        assert_eq!(json["workflows"][0]["state"], "Succeeded");
        assert_eq!(json["workflows"][0]["checks"], 4);
        assert_eq!(json["tables"][0]["rows"], 10);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Init.to_string(), "INIT");
        assert_eq!(Stage::Apply.to_string(), "APPLY");
        assert_eq!(Stage::Verify.to_string(), "VERIFY");
        assert_eq!(Stage::Teardown.to_string(), "TEARDOWN");
    }
}
