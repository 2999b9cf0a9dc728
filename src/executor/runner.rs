//! Bounded execution of a single make target
//!
//! Provides the one place where the gate starts a process:
//! - Argument vector only, never a shell
//! - Child bound to the validated working directory
//! - Environment rebuilt from an allow-list
//! - stdout and stderr merged into one bounded buffer
//! - Timeout that kills the whole process group, not just make
//!
//! The child is owned by a [`ChildGuard`] from spawn to return, so every exit
//! path (normal, timeout, internal fault, or the future being dropped) ends
//! with the process group killed and the direct child reaped.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::env::{ChildEnv, DEFAULT_ALLOWLIST};
use crate::error::{ExecutionError, GateError};

/// Maximum output size before truncation (in bytes)
pub const MAX_OUTPUT_SIZE: usize = 100_000;

/// Exit code reported for a run that hit its timeout
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code reported when the status carries neither a code nor a signal
pub const UNKNOWN_EXIT_CODE: i32 = -2;

/// Timeout applied when a request does not name one
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Accepted timeout range, in seconds
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Truncation marker for large outputs
pub const TRUNCATION_MARKER: &str = "\n... [output truncated] ...\n";

/// How long to keep draining pipes after the process group is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

/// Lifecycle of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Spawning,
    Running,
    Completed,
    TimedOut,
    SpawnFailed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::TimedOut | RunState::SpawnFailed
        )
    }

    fn can_advance_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Spawning)
                | (RunState::Spawning, RunState::Running)
                | (RunState::Spawning, RunState::SpawnFailed)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::TimedOut)
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Spawning => "spawning",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::TimedOut => "timed_out",
            RunState::SpawnFailed => "spawn_failed",
        };
        f.write_str(s)
    }
}

/// Tracks the state of one run and logs each transition
#[derive(Debug)]
struct Lifecycle<'a> {
    target: &'a str,
    state: RunState,
}

impl<'a> Lifecycle<'a> {
    fn new(target: &'a str) -> Self {
        Self {
            target,
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(target_name = self.target, "{} -> {}", self.state, next);
        self.state = next;
    }
}

/// Everything needed to run one target
#[derive(Debug, Clone)]
pub struct ExecSpec {
    /// Target name, already authorized
    pub target: String,
    /// Validated working directory for the child
    pub working_dir: PathBuf,
    /// Makefile passed with `-f`, when make would not find it by itself
    pub makefile: Option<PathBuf>,
    /// Deadline for the whole run
    pub timeout: Duration,
}

impl ExecSpec {
    pub fn new(target: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            working_dir: working_dir.into(),
            makefile: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_makefile(mut self, makefile: impl Into<PathBuf>) -> Self {
        self.makefile = Some(makefile.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_secs(self, secs: u64) -> Self {
        self.with_timeout(Duration::from_secs(secs))
    }

    /// Arguments passed to the build tool, target last
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(3);
        if let Some(ref makefile) = self.makefile {
            args.push(OsString::from("-f"));
            args.push(makefile.as_os_str().to_os_string());
        }
        args.push(OsString::from(&self.target));
        args
    }
}

/// Result of one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Real exit code, `128 + signal` for a signal death, or
    /// [`TIMEOUT_EXIT_CODE`] on timeout
    pub exit_code: i32,
    /// Merged stdout and stderr, bounded in size
    pub output: String,
    /// Whether output hit the size ceiling
    pub truncated: bool,
    pub timed_out: bool,
    pub duration: Duration,
    /// Terminal state the run ended in
    pub state: RunState,
    /// Process id of the direct child
    pub pid: Option<u32>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Anything that can run an authorized target
///
/// [`ProcessRunner`] is the real implementation; tests substitute spies.
pub trait Execute: Send + Sync {
    fn execute(
        &self,
        spec: &ExecSpec,
    ) -> impl Future<Output = Result<ExecutionResult, GateError>> + Send;
}

/// Runs make as a child process
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    make_command: PathBuf,
    max_output: usize,
    env: ChildEnv,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new("make")
    }
}

impl ProcessRunner {
    /// Runner for the given build tool with the default environment allow-list
    pub fn new(make_command: impl Into<PathBuf>) -> Self {
        Self {
            make_command: make_command.into(),
            max_output: MAX_OUTPUT_SIZE,
            env: ChildEnv::from_current(DEFAULT_ALLOWLIST),
        }
    }

    /// Set maximum output size
    pub fn with_max_output(mut self, size: usize) -> Self {
        self.max_output = size;
        self
    }

    pub fn with_env(mut self, env: ChildEnv) -> Self {
        self.env = env;
        self
    }

    pub fn make_command(&self) -> &Path {
        &self.make_command
    }

    pub fn max_output(&self) -> usize {
        self.max_output
    }

    /// Short command line for messages, without absolute paths
    fn display_command(&self, spec: &ExecSpec) -> String {
        let program = self
            .make_command
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "make".to_string());
        format!("{} {}", program, spec.target)
    }

    /// Execute one target
    ///
    /// A timeout is not an error: it returns a result with `timed_out` set
    /// and [`TIMEOUT_EXIT_CODE`], after the process group is dead.
    ///
    /// # Errors
    /// * `ExecutionError::SpawnFailed` - If the build tool could not be started
    /// * `GateError::Io` - If waiting on the child failed
    pub async fn run(&self, spec: &ExecSpec) -> Result<ExecutionResult, GateError> {
        let start = Instant::now();
        let mut lifecycle = Lifecycle::new(&spec.target);
        lifecycle.advance(RunState::Spawning);

        let mut cmd = Command::new(&self.make_command);
        cmd.args(spec.args());
        cmd.current_dir(&spec.working_dir);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        self.env.apply(&mut cmd);
        // Own process group so a timeout can take out grandchildren too
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(
            "Executing: {} {:?} (timeout {:?})",
            self.make_command.display(),
            spec.args(),
            spec.timeout
        );

        let mut child = match cmd.spawn() {
            Ok(child) => ChildGuard::new(child),
            Err(e) => {
                lifecycle.advance(RunState::SpawnFailed);
                return Err(ExecutionError::SpawnFailed {
                    command: self.display_command(spec),
                    error: e.to_string(),
                }
                .into());
            }
        };
        lifecycle.advance(RunState::Running);

        let sink = Arc::new(Mutex::new(OutputBuffer::new(self.max_output)));
        let mut readers = child.take_readers(&sink);

        let waited = tokio::time::timeout(spec.timeout, child.wait()).await;

        let (exit_code, timed_out) = match waited {
            Ok(Ok(status)) => {
                child.kill_stragglers();
                (exit_code_of(status), false)
            }
            Ok(Err(e)) => {
                child.terminate().await;
                child.release();
                readers.abort();
                return Err(GateError::internal(format!(
                    "Failed to wait for {}: {}",
                    self.make_command.display(),
                    e
                )));
            }
            Err(_) => {
                tracing::warn!(
                    "Target '{}' exceeded {:?} timeout, killing process group",
                    spec.target,
                    spec.timeout
                );
                child.terminate().await;
                (TIMEOUT_EXIT_CODE, true)
            }
        };
        child.release();

        readers.drain(DRAIN_GRACE).await;

        let (output, truncated) = take_output(&sink);
        if truncated {
            tracing::warn!(
                "Output of '{}' truncated at {} bytes",
                spec.target,
                self.max_output
            );
        }

        let state = if timed_out {
            RunState::TimedOut
        } else {
            RunState::Completed
        };
        lifecycle.advance(state);

        let duration = start.elapsed();
        tracing::info!(
            "Target '{}' finished: exit_code={} timed_out={} in {}ms",
            spec.target,
            exit_code,
            timed_out,
            duration.as_millis()
        );

        Ok(ExecutionResult {
            exit_code,
            output,
            truncated,
            timed_out,
            duration,
            state,
            pid: child.pid(),
        })
    }
}

impl Execute for ProcessRunner {
    fn execute(
        &self,
        spec: &ExecSpec,
    ) -> impl Future<Output = Result<ExecutionResult, GateError>> + Send {
        self.run(spec)
    }
}

/// Map an exit status to a single integer
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    tracing::warn!("Exit status {:?} has neither a code nor a signal", status);
    UNKNOWN_EXIT_CODE
}

/// Scoped ownership of a spawned child
///
/// Dropping the guard before [`ChildGuard::release`] kills the process group.
struct ChildGuard {
    child: Child,
    pid: Option<u32>,
    released: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            released: false,
        }
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn take_readers(&mut self, sink: &Arc<Mutex<OutputBuffer>>) -> Readers {
        Readers {
            stdout: self.child.stdout.take().map(|r| spawn_pump(r, sink.clone())),
            stderr: self.child.stderr.take().map(|r| spawn_pump(r, sink.clone())),
        }
    }

    async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kill every process in the child's group
    #[cfg(unix)]
    fn kill_group(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else { return };
        match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => {
                tracing::warn!("Failed to kill process group {}: {}", pid, e);
                let _ = self.child.start_kill();
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&mut self) {
        let _ = self.child.start_kill();
    }

    /// Kill whatever the recipe left running after make itself was reaped
    ///
    /// The group id is only reserved while a member is alive. An empty group
    /// is never signalled, since its id may already belong to someone else.
    #[cfg(unix)]
    fn kill_stragglers(&mut self) {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pid) = self.pid else { return };
        if killpg(Pid::from_raw(pid as i32), None).is_ok() {
            tracing::debug!("Process group {} outlived make, killing it", pid);
            self.kill_group();
        }
    }

    #[cfg(not(unix))]
    fn kill_stragglers(&mut self) {}

    /// Kill the group and reap the direct child
    async fn terminate(&mut self) {
        self.kill_group();
        if let Err(e) = self.child.wait().await {
            tracing::warn!("Failed to reap child: {}", e);
        }
    }

    /// Mark the child as fully handled
    fn release(&mut self) {
        self.released = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!("Child guard dropped before release, killing process group");
            self.kill_group();
        }
    }
}

/// Output pump tasks for one child
struct Readers {
    stdout: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<()>>,
}

impl Readers {
    /// Wait for both pipes to close, up to `grace`
    async fn drain(&mut self, grace: Duration) {
        let stdout = &mut self.stdout;
        let stderr = &mut self.stderr;
        let finished = tokio::time::timeout(grace, async move {
            if let Some(handle) = stdout.as_mut() {
                let _ = handle.await;
            }
            if let Some(handle) = stderr.as_mut() {
                let _ = handle.await;
            }
        })
        .await;

        if finished.is_err() {
            tracing::warn!("Output pipes still open after {:?}, abandoning", grace);
        }
        self.abort();
    }

    fn abort(&mut self) {
        for handle in [self.stdout.take(), self.stderr.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

impl Drop for Readers {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Byte buffer shared by the stdout and stderr pumps
#[derive(Debug)]
struct OutputBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(limit.min(64 * 1024)),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.bytes.extend_from_slice(&chunk[..room]);
            self.truncated = true;
        } else {
            self.bytes.extend_from_slice(chunk);
        }
    }

    fn render(&self) -> (String, bool) {
        let mut output = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            output.push_str(TRUNCATION_MARKER);
        }
        (output, self.truncated)
    }
}

fn take_output(sink: &Arc<Mutex<OutputBuffer>>) -> (String, bool) {
    let buffer = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    buffer.render()
}

/// Copy a pipe into the shared buffer until EOF
///
/// Keeps reading after the buffer is full so the child never blocks on a
/// full pipe or dies of SIGPIPE.
fn spawn_pump<R>(mut reader: R, sink: Arc<Mutex<OutputBuffer>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    let mut buffer = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    buffer.push(&chunk[..n]);
                }
                Err(e) => {
                    tracing::warn!("Error reading output: {}", e);
                    break;
                }
            }
        }
    })
}
