use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use automa_core::types::JobId;
use automa_sandbox::SandboxRunner;
use automa_store::{Job, JobStatus, JobStore};
use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::error::Result;

pub const NO_SCRIPT_LINKED: &str = "No script linked to job";
pub const SCRIPT_NOT_FOUND: &str = "Script not found";
pub const SANDBOX_PANICKED: &str = "Sandbox runner panicked";

/// What became of a single `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The job row was gone, either before the run or before the final write.
    Vanished,
    /// The job reached a terminal status; this is the persisted row.
    Finished(Job),
}

/// How the sandbox call ended.
enum RunResult {
    Exited(i32),
    CouldNotRun(String),
}

/// Runs one job from `running` to a terminal status.
///
/// `execute` blocks for the whole sandbox call and is meant to be invoked on
/// a worker that may block.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    sandbox: Arc<dyn SandboxRunner>,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn JobStore>, sandbox: Arc<dyn SandboxRunner>) -> Self {
        Self { store, sandbox }
    }

    /// Execute job `job_id` once.
    ///
    /// Missing scripts and sandbox failures end as `Finished` with status
    /// `failed`. `Err` is returned only when the store itself fails.
    #[instrument(skip(self))]
    pub fn execute(&self, job_id: JobId) -> Result<ExecutionOutcome> {
        let started_at = Utc::now();

        let Some(mut job) = self.store.get_job(job_id)? else {
            warn!("job disappeared before execution");
            return Ok(ExecutionOutcome::Vanished);
        };

        job.status = JobStatus::Running;
        job.last_error = None;
        let job = self.store.save_job(&job)?;
        info!("job running");

        let Some(script_id) = job.script_id else {
            return self.fail_without_run(job, started_at, NO_SCRIPT_LINKED);
        };
        // Re-check at run time; the script may have been deleted since the
        // job was created.
        let Some(script) = self.store.get_script(script_id)? else {
            return self.fail_without_run(job, started_at, SCRIPT_NOT_FOUND);
        };

        // No store lock is held across this call.
        let run = panic::catch_unwind(AssertUnwindSafe(|| self.sandbox.run(&script.path, &[])));
        let result = match run {
            Ok(Ok(code)) => RunResult::Exited(code),
            Ok(Err(e)) => {
                warn!(script = %script.path, "sandbox could not run script: {e}");
                RunResult::CouldNotRun(e.to_string())
            }
            Err(_) => {
                error!(script = %script.path, "sandbox runner panicked");
                RunResult::CouldNotRun(SANDBOX_PANICKED.to_string())
            }
        };

        // Re-read so concurrent writes to other fields are not clobbered.
        let Some(mut job) = self.store.get_job(job_id)? else {
            warn!("job disappeared during execution; result dropped");
            return Ok(ExecutionOutcome::Vanished);
        };

        job.last_run_at = Some(started_at);
        match result {
            RunResult::Exited(0) => {
                job.status = JobStatus::Succeeded;
                job.last_exit_code = Some(0);
                job.last_error = None;
            }
            RunResult::Exited(code) => {
                job.status = JobStatus::Failed;
                job.last_exit_code = Some(code);
                job.last_error = Some(format!("Script exited with code {code}"));
            }
            RunResult::CouldNotRun(msg) => {
                job.status = JobStatus::Failed;
                job.last_exit_code = None;
                job.last_error = Some(msg);
            }
        }

        let job = self.store.save_job(&job)?;
        info!(
            status = %job.status,
            exit_code = ?job.last_exit_code,
            "job finished"
        );
        Ok(ExecutionOutcome::Finished(job))
    }

    fn fail_without_run(
        &self,
        mut job: Job,
        started_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<ExecutionOutcome> {
        job.status = JobStatus::Failed;
        job.last_run_at = Some(started_at);
        job.last_exit_code = None;
        job.last_error = Some(reason.to_string());
        let job = self.store.save_job(&job)?;
        warn!(reason, "job failed before reaching the sandbox");
        Ok(ExecutionOutcome::Finished(job))
    }
}
