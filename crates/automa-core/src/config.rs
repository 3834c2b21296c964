use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AutomaError, Result};

pub const DEFAULT_DISPATCH_CAPACITY: usize = 256;
pub const DEFAULT_MAX_IDLE_SECS: u64 = 30;
pub const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 4_000;

/// Top-level config (automa.toml + AUTOMA_* env overrides).
///
/// Nested keys are separated by a double underscore in the environment,
/// e.g. `AUTOMA_SANDBOX__TIMEOUT_SECS=60`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomaConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    /// Create the directory holding the database file if it is missing.
    pub fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = Path::new(&self.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Capacity of the channel between the trigger loop and the dispatcher.
    #[serde(default = "default_dispatch_capacity")]
    pub dispatch_capacity: usize,
    /// Upper bound on how long the trigger loop sleeps before re-checking the
    /// wall clock, so clock adjustments are picked up.
    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_capacity: DEFAULT_DISPATCH_CAPACITY,
            max_idle_secs: DEFAULT_MAX_IDLE_SECS,
        }
    }
}

/// Which `SandboxRunner` the server wires into the executor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    /// Log the invocation and report success without running anything.
    #[default]
    Stub,
    /// Run the script as a local child process.
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub mode: SandboxMode,
    /// Working directory for child processes; relative script paths resolve
    /// against it. Defaults to the server's cwd.
    pub workdir: Option<String>,
    #[serde(default = "default_sandbox_timeout_secs")]
    pub timeout_secs: u64,
    /// Cap on captured stdout/stderr characters written to the log.
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::default(),
            workdir: None,
            timeout_secs: DEFAULT_SANDBOX_TIMEOUT_SECS,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.automa/automa.db", home)
}
fn default_dispatch_capacity() -> usize {
    DEFAULT_DISPATCH_CAPACITY
}
fn default_max_idle_secs() -> u64 {
    DEFAULT_MAX_IDLE_SECS
}
fn default_sandbox_timeout_secs() -> u64 {
    DEFAULT_SANDBOX_TIMEOUT_SECS
}
fn default_max_output_chars() -> usize {
    DEFAULT_MAX_OUTPUT_CHARS
}

impl AutomaConfig {
    /// Load config from a TOML file with AUTOMA_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.automa/automa.toml
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .merge(Env::prefixed("AUTOMA_").split("__"))
            .extract()
            .map_err(|e| AutomaError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new().merge(Toml::file(path))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.automa/automa.toml", home)
}
