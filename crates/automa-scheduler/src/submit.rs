//! Job-creation flow: persist the job, then register its trigger.

use automa_core::types::{JobId, ScriptId};
use chrono::{DateTime, Utc};
use automa_store::{Job, JobStatus, JobStore};
use tracing::{info, warn};

use crate::{
    error::{Result, SchedulerError},
    scheduler::Scheduler,
    time::parse_when,
};

/// Create a `scheduled` job for `script_id` and arrange for it to run at
/// `when` (`None` = as soon as possible).
///
/// The script must exist at submission time; it is checked again when the
/// job runs. If the run time cannot be registered the job is kept, marked
/// `failed`, and the registration error is returned.
pub fn submit_job(
    store: &dyn JobStore,
    scheduler: &Scheduler,
    script_id: Option<ScriptId>,
    when: Option<&str>,
) -> Result<Job> {
    let (job, job_id, at) = persist(store, script_id, when)?;
    let trigger = scheduler.schedule_once(job_id, at);
    info!(job_id, fire_at = %trigger.fire_at, "job submitted");
    Ok(job)
}

/// Like [`submit_job`] but without registering a trigger: the job is left
/// `scheduled` for [`restore_scheduled`] to pick up, e.g. in another process.
pub fn record_job(
    store: &dyn JobStore,
    script_id: Option<ScriptId>,
    when: Option<&str>,
) -> Result<Job> {
    let (job, job_id, _) = persist(store, script_id, when)?;
    info!(job_id, "job recorded");
    Ok(job)
}

/// Validate, insert, and parse the run time. A malformed time leaves the
/// inserted job `failed`.
fn persist(
    store: &dyn JobStore,
    script_id: Option<ScriptId>,
    when: Option<&str>,
) -> Result<(Job, JobId, Option<DateTime<Utc>>)> {
    if let Some(id) = script_id {
        if store.get_script(id)?.is_none() {
            return Err(SchedulerError::ScriptNotFound(id));
        }
    }

    let parsed = when.map(parse_when).transpose();
    let schedule = match &parsed {
        Ok(Some(at)) => Some(at.to_rfc3339()),
        _ => when.map(str::to_string),
    };

    let mut job = store.save_job(
        &Job::new(script_id)
            .with_status(JobStatus::Scheduled)
            .with_schedule(schedule),
    )?;
    let job_id = job.id.ok_or(SchedulerError::MissingId)?;

    match parsed {
        Ok(at) => Ok((job, job_id, at)),
        Err(e) => {
            warn!(job_id, "unusable run time: {e}");
            job.status = JobStatus::Failed;
            store.save_job(&job)?;
            Err(e)
        }
    }
}

/// Re-register triggers for every job still in `scheduled` state, using the
/// run time recorded in its `schedule` field. Jobs whose recorded time no
/// longer parses are marked `failed`. Returns how many triggers were
/// registered.
pub fn restore_scheduled(store: &dyn JobStore, scheduler: &Scheduler) -> Result<usize> {
    let mut restored = 0;
    for mut job in store.list_jobs_with_status(JobStatus::Scheduled)? {
        let job_id = job.id.ok_or(SchedulerError::MissingId)?;
        match job.schedule.as_deref().map(parse_when).transpose() {
            Ok(at) => {
                scheduler.schedule_once(job_id, at);
                restored += 1;
            }
            Err(e) => {
                warn!(job_id, "dropping unschedulable job: {e}");
                job.status = JobStatus::Failed;
                store.save_job(&job)?;
            }
        }
    }
    info!(count = restored, "scheduled jobs restored");
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use automa_core::config::SchedulerConfig;
    use automa_sandbox::StubRunner;
    use automa_store::{Script, SqliteStore};
    use rusqlite::Connection;

    use super::*;
    use crate::executor::JobExecutor;

    fn setup() -> (Arc<SqliteStore>, Scheduler) {
        let store = Arc::new(SqliteStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let executor = Arc::new(JobExecutor::new(store.clone(), Arc::new(StubRunner)));
        (store, Scheduler::new(executor, SchedulerConfig::default()))
    }

    #[test]
    fn submit_persists_and_registers() {
        let (store, scheduler) = setup();
        let script = store.save_script(&Script::new("s1", "scripts/dummy")).unwrap();

        let job = submit_job(&*store, &scheduler, script.id, Some("2030-01-01T00:00:00")).unwrap();

        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.schedule.as_deref(), Some("2030-01-01T00:00:00+00:00"));
        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].job_id, job.id.unwrap());
    }

    #[test]
    fn submit_without_time_fires_asap() {
        let (store, scheduler) = setup();
        let job = submit_job(&*store, &scheduler, None, None).unwrap();
        assert_eq!(job.schedule, None);
        assert!(scheduler.pending()[0].fire_at <= chrono::Utc::now());
    }

    #[test]
    fn unknown_script_is_rejected_before_insert() {
        let (store, scheduler) = setup();
        let err = submit_job(&*store, &scheduler, Some(999_999), None).unwrap_err();
        assert!(matches!(err, SchedulerError::ScriptNotFound(999_999)));
        assert!(store.list_jobs().unwrap().is_empty());
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn bad_time_marks_job_failed() {
        let (store, scheduler) = setup();
        let err = submit_job(&*store, &scheduler, None, Some("whenever")).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTime(_)));

        let jobs = store.list_jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert_eq!(jobs[0].schedule.as_deref(), Some("whenever"));
        // last_* fields belong to the executor
        assert_eq!(jobs[0].last_error, None);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn record_persists_without_arming() {
        let (store, scheduler) = setup();
        let job = record_job(&*store, None, Some("2030-01-01 08:00")).unwrap();

        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.schedule.as_deref(), Some("2030-01-01T08:00:00+00:00"));
        assert!(scheduler.pending().is_empty());

        assert_eq!(restore_scheduled(&*store, &scheduler).unwrap(), 1);
        assert_eq!(scheduler.pending()[0].job_id, job.id.unwrap());
    }

    #[test]
    fn record_applies_the_same_validation() {
        let (store, _scheduler) = setup();
        assert!(matches!(
            record_job(&*store, Some(42), None),
            Err(SchedulerError::ScriptNotFound(42))
        ));
        assert!(matches!(
            record_job(&*store, None, Some("soon")),
            Err(SchedulerError::InvalidTime(_))
        ));
        let jobs = store.list_jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
    }

    #[test]
    fn restore_registers_scheduled_jobs_only() {
        let (store, scheduler) = setup();
        store
            .save_job(
                &Job::new(None)
                    .with_status(JobStatus::Scheduled)
                    .with_schedule(Some("2030-01-01T00:00:00Z".to_string())),
            )
            .unwrap();
        store
            .save_job(&Job::new(None).with_status(JobStatus::Scheduled))
            .unwrap();
        store
            .save_job(&Job::new(None).with_status(JobStatus::Succeeded))
            .unwrap();
        let broken = store
            .save_job(
                &Job::new(None)
                    .with_status(JobStatus::Scheduled)
                    .with_schedule(Some("garbage".to_string())),
            )
            .unwrap();

        let restored = restore_scheduled(&*store, &scheduler).unwrap();

        assert_eq!(restored, 2);
        assert_eq!(scheduler.pending().len(), 2);
        let broken = store.get_job(broken.id.unwrap()).unwrap().unwrap();
        assert_eq!(broken.status, JobStatus::Failed);
    }
}
