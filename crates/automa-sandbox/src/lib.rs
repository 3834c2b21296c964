//! `automa-sandbox` — the execution facility jobs run their scripts through.
//!
//! The executor only sees the [`SandboxRunner`] trait: run a script path with
//! optional arguments, get an exit code back or an error explaining why the
//! script could not run. Two runners ship:
//! - [`StubRunner`]: logs the invocation and reports success
//! - [`ProcessRunner`]: spawns the script as a local child with a timeout
//!
//! Container isolation and resource limits are not handled here.

pub mod error;
pub mod runner;
pub mod safety;
pub mod truncate;

use std::sync::Arc;

use automa_core::config::{SandboxConfig, SandboxMode};

pub use error::{Result, SandboxError};
pub use runner::{ProcessRunner, SandboxRunner, StubRunner};

/// Build the runner selected by `config.mode`.
pub fn build_runner(config: &SandboxConfig) -> Arc<dyn SandboxRunner> {
    match config.mode {
        SandboxMode::Stub => Arc::new(StubRunner),
        SandboxMode::Process => Arc::new(ProcessRunner::from_config(config)),
    }
}
