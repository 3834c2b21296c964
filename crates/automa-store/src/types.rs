use automa_core::types::{JobId, ScriptId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
///
/// `Pending`/`Scheduled` are written by the creation flow; everything after
/// that is owned by the executor. `Succeeded` and `Failed` are terminal until
/// a new execution is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created but not yet handed to the scheduler.
    Pending,
    /// A trigger is registered for this job.
    Scheduled,
    /// The executor has picked the job up and the sandbox call is in flight.
    Running,
    /// Last execution exited with code 0.
    Succeeded,
    /// Last execution could not run or exited non-zero.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "scheduled" => Ok(JobStatus::Scheduled),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// One requested execution of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Assigned by the store on first save.
    pub id: Option<JobId>,
    /// Script to run; `None` means no script was linked.
    pub script_id: Option<ScriptId>,
    /// Originally requested run time (RFC 3339), informational only.
    pub schedule: Option<String>,
    pub status: JobStatus,
    /// When the most recent execution was attempted.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Exit code of the most recent execution; `None` if the sandbox never
    /// produced one.
    pub last_exit_code: Option<i32>,
    /// Human-readable failure reason; `None` on success.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Refreshed by the store on every save.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A fresh, unsaved job in `pending` state.
    pub fn new(script_id: Option<ScriptId>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            script_id,
            schedule: None,
            status: JobStatus::Pending,
            last_run_at: None,
            last_exit_code: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_schedule(mut self, schedule: Option<String>) -> Self {
        self.schedule = schedule;
        self
    }
}

/// A named, path-addressed executable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub id: Option<ScriptId>,
    /// Unique across all scripts.
    pub name: String,
    pub path: String,
    pub description: Option<String>,
}

impl Script {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            path: path.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
