//! Process-backed sandbox
//!
//! Each invocation gets a fresh scratch directory, a cleared environment,
//! OS resource limits applied before exec, and (for Python) the guard
//! prelude. The scratch directory is removed when the invocation ends,
//! whatever the outcome.

use crate::budget::ResourceBudget;
use crate::error::SandboxError;
use crate::guard::{GUARD_FILE, GUARD_PRELUDE, MEMORY_EXIT_CODE};
use crate::limits::ChildLimits;
use crate::output::{read_capped, render_diagnostics, Captured};
use crate::runtime::SandboxRuntime;
use codegate_artifact::{Candidate, ExecutionOutcome, ExecutionStatus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// File name the candidate is staged under; harnesses import it by this name
pub const CANDIDATE_FILE: &str = "candidate.py";

/// File name the harness is staged under
pub const HARNESS_FILE: &str = "harness.py";

const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

#[cfg(unix)]
const SIGKILL: i32 = 9;
#[cfg(unix)]
const SIGBUS: i32 = 7;
#[cfg(unix)]
const SIGSEGV: i32 = 11;
#[cfg(unix)]
const SIGXCPU: i32 = 24;

/// Process sandbox configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSandboxConfig {
    /// Interpreter binary
    pub interpreter: PathBuf,
    /// Arguments placed before the script path
    pub interpreter_args: Vec<String>,
    /// Run the target through the guard prelude
    pub guard_prelude: bool,
    /// `RLIMIT_NOFILE` for the child
    pub max_open_files: u64,
    /// `RLIMIT_NPROC` for the child
    pub max_processes: u64,
}

impl Default for ProcessSandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            interpreter_args: vec!["-I".to_string(), "-B".to_string()],
            guard_prelude: true,
            max_open_files: 64,
            max_processes: 64,
        }
    }
}

impl ProcessSandboxConfig {
    /// Create config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set interpreter binary
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Replace interpreter arguments
    #[must_use]
    pub fn with_interpreter_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interpreter_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the guard prelude
    #[must_use]
    pub fn with_guard_prelude(mut self, enabled: bool) -> Self {
        self.guard_prelude = enabled;
        self
    }

    /// Set open-file limit
    #[must_use]
    pub fn with_max_open_files(mut self, limit: u64) -> Self {
        self.max_open_files = limit;
        self
    }

    /// Set process-count limit
    #[must_use]
    pub fn with_max_processes(mut self, limit: u64) -> Self {
        self.max_processes = limit;
        self
    }
}

/// How the wait on the child ended
enum Ended {
    Exited(ExitStatus),
    Killed,
}

/// Sandbox that runs each candidate in a fresh child process
#[derive(Debug, Clone, Default)]
pub struct ProcessSandbox {
    config: ProcessSandboxConfig,
}

impl ProcessSandbox {
    /// Create sandbox with the given configuration
    #[must_use]
    pub fn new(config: ProcessSandboxConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProcessSandboxConfig {
        &self.config
    }

    /// Write candidate, harness and guard into `scratch`; returns the script
    /// the interpreter should run
    async fn stage(
        &self,
        scratch: &Path,
        candidate: &Candidate,
        harness: Option<&str>,
    ) -> Result<PathBuf, SandboxError> {
        let candidate_path = scratch.join(CANDIDATE_FILE);
        write_file(&candidate_path, candidate.text()).await?;

        let target = match harness {
            Some(harness) => {
                let harness_path = scratch.join(HARNESS_FILE);
                write_file(&harness_path, harness).await?;
                harness_path
            }
            None => candidate_path,
        };

        if self.config.guard_prelude {
            write_file(&scratch.join(GUARD_FILE), GUARD_PRELUDE).await?;
        }
        Ok(target)
    }

    fn command(&self, scratch: &Path, target: &Path, budget: &ResourceBudget) -> Command {
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.args(&self.config.interpreter_args);
        if self.config.guard_prelude {
            cmd.arg(scratch.join(GUARD_FILE)).arg(scratch);
        }
        cmd.arg(target);

        cmd.env_clear()
            .env("PATH", SANDBOX_PATH)
            .env("HOME", scratch)
            .env("TMPDIR", scratch)
            .env("LANG", "C.UTF-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONHASHSEED", "0")
            .env("PYTHONIOENCODING", "utf-8")
            .current_dir(scratch)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limits = ChildLimits::for_budget(
            budget,
            self.config.max_open_files,
            self.config.max_processes,
        );
        install_limits(&mut cmd, limits);
        cmd
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn install_limits(cmd: &mut Command, limits: ChildLimits) {
    // SAFETY: the hook only calls setrlimit on a captured Copy value.
    unsafe {
        cmd.pre_exec(move || crate::limits::apply_rlimits(&limits));
    }
}

#[cfg(not(unix))]
fn install_limits(_cmd: &mut Command, _limits: ChildLimits) {}

#[async_trait::async_trait]
impl SandboxRuntime for ProcessSandbox {
    async fn execute(
        &self,
        candidate: &Candidate,
        harness: Option<&str>,
        budget: &ResourceBudget,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, SandboxError> {
        budget.validate()?;
        if cancel.is_cancelled() {
            return Err(SandboxError::Cancelled);
        }

        let scratch = tempfile::Builder::new()
            .prefix("codegate-")
            .tempdir()
            .map_err(SandboxError::Scratch)?;
        let target = self.stage(scratch.path(), candidate, harness).await?;

        let started = Instant::now();
        let mut child = self
            .command(scratch.path(), &target, budget)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                interpreter: self.config.interpreter.clone(),
                source,
            })?;

        debug!(
            hash = %candidate.hash(),
            attempt = candidate.attempt(),
            pid = child.id(),
            "Sandbox child started"
        );

        let cap = budget.max_output_bytes;
        let mut stdout = tokio::spawn(read_capped(child.stdout.take(), cap));
        let mut stderr = tokio::spawn(read_capped(child.stderr.take(), cap));

        let ended = tokio::select! {
            status = child.wait() => Ended::Exited(status?),
            () = tokio::time::sleep(budget.timeout()) => {
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "Failed to kill timed-out sandbox child");
                }
                Ended::Killed
            }
            () = cancel.cancelled() => {
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "Failed to kill cancelled sandbox child");
                }
                stdout.abort();
                stderr.abort();
                return Err(SandboxError::Cancelled);
            }
        };
        let elapsed = started.elapsed();

        let stdout = collect(&mut stdout).await;
        let stderr = collect(&mut stderr).await;
        let diagnostics = render_diagnostics(&stdout, &stderr, cap);

        let outcome = match ended {
            Ended::Killed => ExecutionOutcome::new(
                ExecutionStatus::TimedOut,
                with_reason(
                    diagnostics,
                    &format!("killed after {}s wall-clock timeout", budget.timeout_secs),
                ),
                elapsed,
            ),
            Ended::Exited(status) => outcome_for_exit(status, diagnostics, elapsed, budget),
        };

        debug!(
            hash = %candidate.hash(),
            status = %outcome.status,
            exit_code = ?outcome.exit_code,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Sandbox child finished"
        );
        Ok(outcome)
    }
}

async fn write_file(path: &Path, contents: &str) -> Result<(), SandboxError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| SandboxError::Stage {
            path: path.to_path_buf(),
            source,
        })
}

/// Wait briefly for a reader task; a grandchild holding the pipe open must
/// not stall the verdict
async fn collect(task: &mut JoinHandle<Captured>) -> Captured {
    match tokio::time::timeout(OUTPUT_GRACE, &mut *task).await {
        Ok(Ok(captured)) => captured,
        Ok(Err(_)) => Captured::default(),
        Err(_) => {
            task.abort();
            Captured::default()
        }
    }
}

fn with_reason(mut diagnostics: String, reason: &str) -> String {
    if !diagnostics.is_empty() && !diagnostics.ends_with('\n') {
        diagnostics.push('\n');
    }
    diagnostics.push_str(reason);
    diagnostics
}

fn outcome_for_exit(
    status: ExitStatus,
    diagnostics: String,
    elapsed: Duration,
    budget: &ResourceBudget,
) -> ExecutionOutcome {
    if let Some(code) = status.code() {
        let status = classify_exit_code(code);
        return ExecutionOutcome::new(status, diagnostics, elapsed).with_exit_code(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            let status = classify_signal(signal, budget.within_timeout(elapsed));
            let diagnostics = with_reason(diagnostics, &format!("terminated by signal {signal}"));
            return ExecutionOutcome::new(status, diagnostics, elapsed);
        }
    }
    #[cfg(not(unix))]
    let _ = budget;

    ExecutionOutcome::new(ExecutionStatus::Failed, diagnostics, elapsed)
}

pub(crate) fn classify_exit_code(code: i32) -> ExecutionStatus {
    match code {
        0 => ExecutionStatus::Succeeded,
        MEMORY_EXIT_CODE => ExecutionStatus::ResourceExceeded,
        _ => ExecutionStatus::Failed,
    }
}

/// Map a terminating signal to a status
///
/// `SIGXCPU` is the CPU backstop firing. Memory exhaustion inside native
/// code shows up as `SIGSEGV`/`SIGBUS`, and the kernel OOM killer sends
/// `SIGKILL`; a `SIGKILL` past the wall clock is treated as a timeout.
#[cfg(unix)]
pub(crate) fn classify_signal(signal: i32, within_budget: bool) -> ExecutionStatus {
    match signal {
        SIGXCPU => ExecutionStatus::TimedOut,
        SIGSEGV | SIGBUS | SIGKILL if within_budget => ExecutionStatus::ResourceExceeded,
        SIGKILL => ExecutionStatus::TimedOut,
        _ => ExecutionStatus::Failed,
    }
}
