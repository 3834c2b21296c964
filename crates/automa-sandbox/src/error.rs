//! Error types for the automa-sandbox crate.

use thiserror::Error;

/// Reasons a script could not be run to completion.
///
/// A script that runs and exits non-zero is *not* an error; the exit code is
/// returned as `Ok`.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The script path failed validation before anything was spawned.
    #[error("Script path rejected: {reason}")]
    PathRejected { reason: String },

    /// The child process could not be started.
    #[error("Failed to start script: {0}")]
    Spawn(String),

    /// Underlying I/O failure while waiting on the child.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The script exceeded its wall-clock budget and was killed.
    #[error("Script timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The script was terminated by a signal and produced no exit code.
    #[error("Script terminated by signal")]
    Signaled,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SandboxError>;
