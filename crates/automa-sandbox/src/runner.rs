use std::{
    future::Future,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use automa_core::config::SandboxConfig;
use tokio::{process::Command, time::Instant};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{Result, SandboxError},
    safety, truncate,
};

/// Runs one script to completion and reports its exit code.
///
/// Calls block the current thread; callers are expected to be on a worker
/// that may block (the scheduler runs executions via `spawn_blocking`).
pub trait SandboxRunner: Send + Sync {
    /// Run `script_path` with `args`.
    ///
    /// `Ok(code)` whenever the script ran, whatever the code. `Err` only
    /// when it could not be run or did not finish.
    fn run(&self, script_path: &str, args: &[String]) -> Result<i32>;
}

/// Logs the invocation and reports exit code 0 without running anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubRunner;

impl SandboxRunner for StubRunner {
    fn run(&self, script_path: &str, args: &[String]) -> Result<i32> {
        info!(script = %script_path, ?args, "sandbox stub: would run script");
        Ok(0)
    }
}

/// Runs scripts as local child processes with a wall-clock timeout.
///
/// The timeout covers the whole run, including reading the script's output:
/// a script that leaves a background process holding its stdout or stderr
/// has not finished until that process lets go.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    workdir: Option<PathBuf>,
    timeout: Duration,
    max_output_chars: usize,
}

impl ProcessRunner {
    pub fn new(workdir: Option<PathBuf>, timeout: Duration, max_output_chars: usize) -> Self {
        Self {
            workdir,
            timeout,
            max_output_chars,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(
            config.workdir.as_ref().map(PathBuf::from),
            Duration::from_secs(config.timeout_secs),
            config.max_output_chars,
        )
    }

    fn resolve(&self, script_path: &str) -> PathBuf {
        let path = Path::new(script_path);
        match &self.workdir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    async fn run_child(&self, script_path: &str, args: &[String]) -> Result<i32> {
        let program = self.resolve(script_path);
        let mut command = Command::new(&program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        // A timeout too large to represent means no deadline at all.
        let deadline = Instant::now().checked_add(self.timeout);

        let child = command
            .spawn()
            .map_err(|e| SandboxError::Spawn(format!("{}: {e}", program.display())))?;
        let pid = child.id();
        debug!(?pid, "script spawned");

        // Dropping the pending future drops the child, which kills it.
        let output = match within(deadline, child.wait_with_output()).await {
            Some(output) => output?,
            None => {
                let ms = self.timeout_ms();
                warn!(?pid, ms, "script timed out, killed");
                return Err(SandboxError::Timeout { ms });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.is_empty() {
            debug!(
                stdout = %truncate::keep_tail(&stdout, self.max_output_chars),
                "script stdout"
            );
        }
        if !stderr.is_empty() {
            info!(
                stderr = %truncate::keep_tail(&stderr, self.max_output_chars),
                "script stderr"
            );
        }

        match output.status.code() {
            Some(code) => {
                info!(exit_code = code, "script finished");
                Ok(code)
            }
            None => Err(SandboxError::Signaled),
        }
    }
}

impl SandboxRunner for ProcessRunner {
    /// Drives the child on the caller's Tokio runtime when there is one
    /// (the scheduler's blocking workers), otherwise on a throwaway
    /// current-thread runtime.
    #[instrument(skip(self, args), fields(script = %script_path))]
    fn run(&self, script_path: &str, args: &[String]) -> Result<i32> {
        safety::check_script_path(script_path)
            .map_err(|reason| SandboxError::PathRejected { reason })?;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle.block_on(self.run_child(script_path, args)),
            Err(_) => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(self.run_child(script_path, args)),
        }
    }
}

/// Await `fut`, giving up at `deadline` if there is one.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{fs, os::unix::fs::PermissionsExt, time::Instant};

    use super::*;

    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        name.to_string()
    }

    fn runner(dir: &Path, timeout: Duration) -> ProcessRunner {
        ProcessRunner::new(Some(dir.to_path_buf()), timeout, 1_000)
    }

    #[test]
    fn stub_always_succeeds() {
        assert_eq!(StubRunner.run("scripts/dummy", &[]).unwrap(), 0);
    }

    #[test]
    fn zero_exit_code_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "ok.sh", "echo hello");
        let code = runner(dir.path(), Duration::from_secs(5))
            .run(&script, &[])
            .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn non_zero_exit_code_is_still_ok() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "fail.sh", "echo nope >&2; exit 3");
        let code = runner(dir.path(), Duration::from_secs(5))
            .run(&script, &[])
            .unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    fn arguments_are_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "args.sh", r#"[ "$1" = "alpha" ] && exit 0; exit 9"#);
        let r = runner(dir.path(), Duration::from_secs(5));
        assert_eq!(r.run(&script, &["alpha".to_string()]).unwrap(), 0);
        assert_eq!(r.run(&script, &["beta".to_string()]).unwrap(), 9);
    }

    #[test]
    fn missing_script_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(dir.path(), Duration::from_secs(5))
            .run("does-not-exist.sh", &[])
            .unwrap_err();
        assert!(matches!(err, SandboxError::Spawn(_)));
    }

    #[test]
    fn slow_script_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "slow.sh", "sleep 5");
        let started = Instant::now();
        let err = runner(dir.path(), Duration::from_millis(200))
            .run(&script, &[])
            .unwrap_err();
        assert!(matches!(err, SandboxError::Timeout { ms: 200 }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn background_child_cannot_outlive_the_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "bg.sh", "sleep 3 &\nexit 0");
        let started = Instant::now();
        let err = runner(dir.path(), Duration::from_millis(300))
            .run(&script, &[])
            .unwrap_err();
        assert!(matches!(err, SandboxError::Timeout { ms: 300 }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn unrepresentable_timeout_means_no_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "ok.sh", "exit 0");
        let code = runner(dir.path(), Duration::from_secs(u64::MAX))
            .run(&script, &[])
            .unwrap();
        assert_eq!(code, 0);
        let config = SandboxConfig {
            timeout_secs: i64::MAX as u64,
            workdir: Some(dir.path().to_string_lossy().into_owned()),
            ..SandboxConfig::default()
        };
        assert_eq!(ProcessRunner::from_config(&config).run(&script, &[]).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_on_the_callers_runtime_from_a_blocking_worker() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "fail.sh", "exit 5");
        let r = runner(dir.path(), Duration::from_secs(5));
        let code = tokio::task::spawn_blocking(move || r.run(&script, &[]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code, 5);
    }

    #[test]
    fn killed_by_signal_is_signaled() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "self-kill.sh", "kill -9 $$");
        let err = runner(dir.path(), Duration::from_secs(5))
            .run(&script, &[])
            .unwrap_err();
        assert!(matches!(err, SandboxError::Signaled));
    }

    #[test]
    fn traversal_rejected_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(dir.path(), Duration::from_secs(5))
            .run("../escape.sh", &[])
            .unwrap_err();
        assert!(matches!(err, SandboxError::PathRejected { .. }));
    }
}
