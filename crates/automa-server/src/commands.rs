use std::time::Duration;

use anyhow::{anyhow, bail};
use automa_scheduler::{record_job, restore_scheduled, submit_job, ExecutionOutcome};
use automa_store::{Job, JobStatus, Script};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::App;
use crate::cli::{JobCommand, ScriptCommand};

const WAIT_POLL: Duration = Duration::from_millis(200);

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run the trigger loop until Ctrl-C.
pub async fn serve(app: &App) -> anyhow::Result<()> {
    let restored = restore_scheduled(app.store.as_ref(), &app.scheduler)?;
    app.scheduler.start()?;
    info!(restored, "scheduler running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!(
        pending = app.scheduler.pending().len(),
        "shutting down; pending jobs stay scheduled"
    );
    app.scheduler.shutdown();
    Ok(())
}

pub fn script(app: &App, action: ScriptCommand) -> anyhow::Result<()> {
    match action {
        ScriptCommand::Add {
            name,
            path,
            description,
        } => {
            let mut script = Script::new(name, path);
            if let Some(description) = description {
                script = script.with_description(description);
            }
            print_json(&app.store.save_script(&script)?)
        }
        ScriptCommand::List => print_json(&app.store.list_scripts()?),
        ScriptCommand::Remove { id } => {
            app.store.delete_script(id)?;
            let orphaned = app
                .store
                .list_jobs()?
                .into_iter()
                .filter(|job| job.script_id == Some(id) && !job.status.is_terminal())
                .count();
            if orphaned > 0 {
                warn!(script_id = id, orphaned, "unfinished jobs still reference this script");
            }
            Ok(())
        }
    }
}

pub async fn job(app: &App, action: JobCommand) -> anyhow::Result<()> {
    match action {
        JobCommand::Submit {
            script_id,
            at,
            detach,
        } => {
            if detach {
                return print_json(&record_job(app.store.as_ref(), script_id, at.as_deref())?);
            }
            let job = submit_job(app.store.as_ref(), &app.scheduler, script_id, at.as_deref())?;
            app.scheduler.start()?;
            let result = wait_for_terminal(app, job_id(&job)?).await;
            app.scheduler.shutdown();
            print_json(&result?)
        }
        JobCommand::List { status } => {
            let jobs = match status {
                Some(status) => app.store.list_jobs_with_status(status)?,
                None => app.store.list_jobs()?,
            };
            print_json(&jobs)
        }
        JobCommand::Show { id } => match app.store.get_job(id)? {
            Some(job) => print_json(&job),
            None => bail!("job {id} not found"),
        },
        JobCommand::Run { id } => {
            let executor = app.scheduler.executor().clone();
            match tokio::task::spawn_blocking(move || executor.execute(id)).await?? {
                ExecutionOutcome::Finished(job) => print_json(&job),
                ExecutionOutcome::Vanished => bail!("job {id} not found"),
            }
        }
    }
}

fn job_id(job: &Job) -> anyhow::Result<i64> {
    job.id.ok_or_else(|| anyhow!("stored job has no id"))
}

/// Poll the store until the job leaves `scheduled`/`running`.
async fn wait_for_terminal(app: &App, id: i64) -> anyhow::Result<Job> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                bail!("interrupted; job {id} stays scheduled for the next `serve`")
            }
            _ = tokio::time::sleep(WAIT_POLL) => {
                match app.store.get_job(id)? {
                    Some(job) if job.status.is_terminal() => return Ok(job),
                    Some(job) if job.status == JobStatus::Pending => {
                        bail!("job {id} went back to pending")
                    }
                    Some(_) => {}
                    None => bail!("job {id} was deleted"),
                }
            }
        }
    }
}
