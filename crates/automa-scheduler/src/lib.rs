//! `automa-scheduler` — one-shot job triggers and the job executor.
//!
//! # Overview
//!
//! A [`Scheduler`] keeps at most one pending trigger per job id, keyed
//! `job-<id>`. A single background loop fires due triggers by sending the
//! job id to a dispatcher, which runs [`JobExecutor::execute`] on a blocking
//! worker. The executor drives the job through
//! `running → succeeded | failed`, persisting twice: once before the sandbox
//! call so readers see `running`, and once after, re-reading the row first.
//!
//! | Call                    | Effect                                              |
//! |-------------------------|-----------------------------------------------------|
//! | `start`                 | spawn the trigger loop + dispatcher (idempotent)    |
//! | `shutdown`              | stop firing; in-flight runs finish (idempotent)     |
//! | `schedule_once(id, at)` | add or replace the trigger for `id` (`None` = now)  |
//! | `cancel(id)`            | drop the pending trigger for `id`                   |

pub mod error;
pub mod executor;
pub mod scheduler;
pub mod submit;
pub mod time;

pub use error::{Result, SchedulerError};
pub use executor::{ExecutionOutcome, JobExecutor};
pub use scheduler::{Scheduler, TriggerInfo};
pub use submit::{record_job, restore_scheduled, submit_job};
pub use time::{parse_when, trigger_key};
