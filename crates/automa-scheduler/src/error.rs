use automa_core::types::ScriptId;
use automa_store::StoreError;
use thiserror::Error;

/// Errors surfaced synchronously by the scheduler subsystem.
///
/// Failures inside a fired execution never appear here; they are recorded on
/// the job row by the executor.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The requested run time could not be understood.
    #[error("Invalid schedule time: {0}")]
    InvalidTime(String),

    /// `start` was called outside a Tokio runtime.
    #[error("Scheduler requires a Tokio runtime to start")]
    NoRuntime,

    /// A job was submitted against a script id that does not resolve.
    #[error("Script not found: {0}")]
    ScriptNotFound(ScriptId),

    /// The store saved a job but did not hand back its id.
    #[error("Store returned a job without an id")]
    MissingId,

    /// Underlying job store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
