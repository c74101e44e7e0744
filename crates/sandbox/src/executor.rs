//! Isolated execution of validated submissions — phase two of the sandbox.
//!
//! One freshly spawned interpreter process per submission: isolated mode
//! (`-I`), cleared environment, a throwaway temp directory as cwd, stdin
//! closed, stdout/stderr captured. On unix the child applies the
//! [`SandboxPolicy`] rlimits before exec; elsewhere the wall-clock kill and
//! process isolation still apply and the rlimits are skipped.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::policy::SandboxPolicy;
use crate::validator::CodeValidator;
use crate::SandboxError;

/// Captured output of a completed sandboxed run.
///
/// A non-zero exit (an exception in the submission) is not a sandbox
/// failure — the output is still returned for the model to observe.
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl ExecutionOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs validated code submissions in isolated, resource-limited processes.
pub struct SandboxExecutor {
    policy: SandboxPolicy,
    validator: CodeValidator,
    interpreter: PathBuf,
}

impl SandboxExecutor {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self {
            policy,
            validator: CodeValidator::default(),
            interpreter: PathBuf::from("python3"),
        }
    }

    /// Override the interpreter binary (e.g. a hermetic python build).
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Replace the validator, e.g. with a tightened [`crate::DenyPolicy`].
    pub fn with_validator(mut self, validator: CodeValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Validate and run one submission.
    ///
    /// Rejected submissions return [`SandboxError::Rejected`] without any
    /// process being spawned. The wall-clock timeout and a cancellation
    /// both kill the child; a resource-limit kill (SIGKILL/SIGXCPU) is
    /// reported as [`SandboxError::ResourceExceeded`].
    pub async fn run(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutput, SandboxError> {
        self.validator
            .validate(code)
            .map_err(SandboxError::Rejected)?;

        let dir = tempfile::tempdir().map_err(|e| SandboxError::Spawn(e.to_string()))?;
        let script = dir.path().join("submission.py");
        tokio::fs::write(&script, code)
            .await
            .map_err(|e| SandboxError::Spawn(e.to_string()))?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-I") // isolated mode: no site dir, no env-derived sys.path
            .arg(&script)
            .env_clear()
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            let policy = self.policy.clone();
            // Applied in the child between fork and exec; enforced by the
            // kernel for the lifetime of the process.
            unsafe {
                cmd.pre_exec(move || apply_rlimits(&policy));
            }
        }

        debug!(interpreter = %self.interpreter.display(), "Spawning sandboxed process");
        let start = Instant::now();
        let child = cmd.spawn().map_err(|e| SandboxError::Spawn(e.to_string()))?;

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let output = tokio::select! {
            _ = cancel.cancelled() => {
                // Dropping the pinned future drops the child; kill_on_drop
                // reaps it.
                warn!("Sandboxed run cancelled, killing child");
                return Err(SandboxError::Cancelled);
            }
            result = tokio::time::timeout(self.policy.wall_clock, &mut wait) => {
                match result {
                    Err(_) => {
                        warn!(
                            timeout_secs = self.policy.wall_clock.as_secs(),
                            "Sandboxed run exceeded wall clock, killing child"
                        );
                        return Err(SandboxError::ResourceExceeded(format!(
                            "wall-clock timeout after {}s",
                            self.policy.wall_clock.as_secs()
                        )));
                    }
                    Ok(Err(e)) => return Err(SandboxError::Spawn(e.to_string())),
                    Ok(Ok(output)) => output,
                }
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = output.status.signal() {
                return Err(SandboxError::ResourceExceeded(format!(
                    "process killed by signal {signal} (resource limit)"
                )));
            }
        }

        Ok(ExecutionOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            duration_ms,
        })
    }
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self::new(SandboxPolicy::default())
    }
}

/// Apply the policy's rlimits in the forked child.
///
/// Runs between fork and exec, so only async-signal-safe calls are allowed.
#[cfg(unix)]
fn apply_rlimits(policy: &SandboxPolicy) -> std::io::Result<()> {
    // The resource constant's type differs between libcs (u32 on glibc,
    // c_int elsewhere), hence the `as _` coercions.
    fn set(resource: libc::c_int, limit: u64) -> std::io::Result<()> {
        let rlim = libc::rlimit {
            rlim_cur: limit as libc::rlim_t,
            rlim_max: limit as libc::rlim_t,
        };
        // Safety: rlim is a valid rlimit struct for the given resource.
        if unsafe { libc::setrlimit(resource as _, &rlim) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    set(libc::RLIMIT_CPU as libc::c_int, policy.cpu_time_secs)?;
    set(libc::RLIMIT_AS as libc::c_int, policy.address_space_bytes)?;
    set(libc::RLIMIT_NPROC as libc::c_int, policy.max_processes)?;
    set(libc::RLIMIT_NOFILE as libc::c_int, policy.max_open_files)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_policy() -> SandboxPolicy {
        SandboxPolicy::default().with_wall_clock(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn rejected_code_never_spawns() {
        // Point at a nonexistent interpreter: if validation didn't reject
        // first, spawning would fail with a different error.
        let executor =
            SandboxExecutor::new(fast_policy()).with_interpreter("/nonexistent/python3");
        let cancel = CancellationToken::new();
        let result = executor.run("import os; os.system(\"ls\")", &cancel).await;
        match result {
            Err(SandboxError::Rejected(reasons)) => {
                assert!(reasons.iter().any(|r| r == "denied import: os"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout() {
        let executor = SandboxExecutor::new(fast_policy());
        let cancel = CancellationToken::new();
        let output = executor.run("print(21 * 2)", &cancel).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "42");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exception_is_captured_not_a_sandbox_error() {
        let executor = SandboxExecutor::new(fast_policy());
        let cancel = CancellationToken::new();
        let output = executor
            .run("raise ValueError('boom')", &cancel)
            .await
            .unwrap();
        assert!(!output.success());
        assert!(output.stderr.contains("ValueError"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spinning_submission_killed_at_wall_clock() {
        let executor = SandboxExecutor::new(
            SandboxPolicy::default().with_wall_clock(Duration::from_secs(1)),
        );
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let result = executor.run("while True:\n    pass", &cancel).await;
        assert!(matches!(result, Err(SandboxError::ResourceExceeded(_))));
        // Wall clock plus scheduling tolerance; the host stays responsive.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_kills_child() {
        let executor = SandboxExecutor::new(
            SandboxPolicy::default().with_wall_clock(Duration::from_secs(30)),
        );
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel_clone.cancel();
        });
        let start = Instant::now();
        let result = executor.run("while True:\n    pass", &cancel).await;
        assert!(matches!(result, Err(SandboxError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_are_isolated_from_each_other() {
        let executor = SandboxExecutor::new(fast_policy());
        let cancel = CancellationToken::new();
        executor.run("x = 41", &cancel).await.unwrap();
        // A later run must not see the earlier run's state
        let output = executor.run("print(x)", &cancel).await.unwrap();
        assert!(!output.success());
        assert!(output.stderr.contains("NameError"));
    }
}
