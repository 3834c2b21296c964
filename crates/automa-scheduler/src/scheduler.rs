use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use automa_core::{config::SchedulerConfig, types::JobId};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, SchedulerError},
    executor::{ExecutionOutcome, JobExecutor},
    time::trigger_key,
};

/// Snapshot of one pending trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerInfo {
    /// `job-<id>`
    pub key: String,
    pub job_id: JobId,
    pub fire_at: DateTime<Utc>,
}

/// Pending triggers plus the signal used to re-arm the loop when they change.
#[derive(Default)]
struct TriggerSet {
    triggers: Mutex<HashMap<String, TriggerInfo>>,
    changed: Notify,
}

impl TriggerSet {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, TriggerInfo>> {
        self.triggers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove and return every trigger due at `now`, plus the earliest
    /// remaining fire time. Runs under one lock so a concurrent replacement
    /// either lands before the pop (and fires) or after it (and is new).
    fn take_due(&self, now: DateTime<Utc>) -> (Vec<TriggerInfo>, Option<DateTime<Utc>>) {
        let mut triggers = self.lock();
        let due_keys: Vec<String> = triggers
            .iter()
            .filter(|(_, t)| t.fire_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        let mut due: Vec<TriggerInfo> = due_keys
            .iter()
            .filter_map(|k| triggers.remove(k))
            .collect();
        due.sort_by_key(|t| t.fire_at);
        let next = triggers.values().map(|t| t.fire_at).min();
        (due, next)
    }
}

/// Handles owned while the loop is active.
struct Active {
    shutdown_tx: watch::Sender<bool>,
}

/// One-shot job scheduler.
///
/// Constructed once by the composition root and shared by reference with
/// whatever creates jobs. Triggers may be registered while stopped; they fire
/// once `start` has been called.
pub struct Scheduler {
    triggers: Arc<TriggerSet>,
    executor: Arc<JobExecutor>,
    config: SchedulerConfig,
    active: Mutex<Option<Active>>,
}

impl Scheduler {
    pub fn new(executor: Arc<JobExecutor>, config: SchedulerConfig) -> Self {
        Self {
            triggers: Arc::new(TriggerSet::default()),
            executor,
            config,
            active: Mutex::new(None),
        }
    }

    pub fn executor(&self) -> &Arc<JobExecutor> {
        &self.executor
    }

    fn active(&self) -> MutexGuard<'_, Option<Active>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn the trigger loop and dispatcher on the current Tokio runtime.
    ///
    /// Calling `start` while already running is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut active = self.active();
        if active.is_some() {
            debug!("scheduler already running");
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (fired_tx, fired_rx) = mpsc::channel::<TriggerInfo>(self.config.dispatch_capacity.max(1));
        let max_idle = Duration::from_secs(self.config.max_idle_secs.max(1));

        runtime.spawn(trigger_loop(
            Arc::clone(&self.triggers),
            fired_tx,
            shutdown_rx,
            max_idle,
        ));
        runtime.spawn(dispatch_loop(fired_rx, Arc::clone(&self.executor)));

        *active = Some(Active { shutdown_tx });
        info!("scheduler started");
        Ok(())
    }

    /// Stop firing triggers. Does not wait for, or interrupt, executions
    /// already in progress. Pending triggers are kept and fire after the next
    /// `start`. Calling `shutdown` while stopped is a no-op.
    pub fn shutdown(&self) {
        match self.active().take() {
            Some(active) => {
                // The loop may already have exited; nothing to report then.
                let _ = active.shutdown_tx.send(true);
                info!("scheduler shutting down");
            }
            None => debug!("scheduler not running"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active().is_some()
    }

    /// Register a trigger for `job_id` at `when` (`None` = as soon as the loop
    /// next turns). An existing trigger for the same job is replaced.
    pub fn schedule_once(&self, job_id: JobId, when: Option<DateTime<Utc>>) -> TriggerInfo {
        let trigger = TriggerInfo {
            key: trigger_key(job_id),
            job_id,
            fire_at: when.unwrap_or_else(Utc::now),
        };
        let replaced = self
            .triggers
            .lock()
            .insert(trigger.key.clone(), trigger.clone());
        match replaced {
            Some(old) => info!(
                job_id,
                old_fire_at = %old.fire_at,
                fire_at = %trigger.fire_at,
                "trigger replaced"
            ),
            None => info!(job_id, fire_at = %trigger.fire_at, "trigger registered"),
        }
        self.triggers.changed.notify_one();
        trigger
    }

    /// Drop the pending trigger for `job_id`. Returns whether one existed.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let removed = self.triggers.lock().remove(&trigger_key(job_id)).is_some();
        if removed {
            info!(job_id, "trigger cancelled");
            self.triggers.changed.notify_one();
        }
        removed
    }

    /// Pending triggers ordered by fire time.
    pub fn pending(&self) -> Vec<TriggerInfo> {
        let mut pending: Vec<TriggerInfo> = self.triggers.lock().values().cloned().collect();
        pending.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.job_id.cmp(&b.job_id)));
        pending
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fire due triggers until shutdown. Sleeps until the next fire time, a
/// trigger change, or `max_idle`, whichever comes first.
async fn trigger_loop(
    triggers: Arc<TriggerSet>,
    fired_tx: mpsc::Sender<TriggerInfo>,
    mut shutdown: watch::Receiver<bool>,
    max_idle: Duration,
) {
    info!("trigger loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        let (due, next) = triggers.take_due(Utc::now());
        for trigger in due {
            info!(job_id = trigger.job_id, key = %trigger.key, "trigger fired");
            if fired_tx.send(trigger).await.is_err() {
                error!("dispatcher gone; trigger loop exiting");
                return;
            }
        }

        let sleep_for = next
            .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(max_idle)
            .min(max_idle);

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = triggers.changed.notified() => {}
            changed = shutdown.changed() => {
                // A dropped sender also means stop.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("trigger loop stopped");
}

/// Run each fired job on its own blocking worker. Ends once the trigger
/// loop has exited and every already-fired job has been handed off.
async fn dispatch_loop(mut fired_rx: mpsc::Receiver<TriggerInfo>, executor: Arc<JobExecutor>) {
    while let Some(trigger) = fired_rx.recv().await {
        tokio::spawn(run_guarded(Arc::clone(&executor), trigger.job_id));
    }
    debug!("dispatcher stopped");
}

/// Execute one job, logging anything that escapes the executor (store
/// errors, panics) so it never reaches the loops.
async fn run_guarded(executor: Arc<JobExecutor>, job_id: JobId) {
    let joined = tokio::task::spawn_blocking(move || executor.execute(job_id)).await;
    match joined {
        Ok(Ok(ExecutionOutcome::Finished(job))) => {
            debug!(job_id, status = %job.status, "execution complete");
        }
        Ok(Ok(ExecutionOutcome::Vanished)) => {
            debug!(job_id, "execution skipped: job vanished");
        }
        Ok(Err(e)) => error!(job_id, "job execution failed: {e}"),
        Err(e) if e.is_panic() => error!(job_id, "job execution panicked"),
        Err(e) => warn!(job_id, "job execution task cancelled: {e}"),
    }
}
