//! Common test utilities for makegate tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use makegate::config::Config;
use makegate::context::ServerContext;
use makegate::error::GateError;
use makegate::executor::{ExecSpec, Execute, ExecutionResult, RunState};
use tempfile::TempDir;

/// Creates a temporary directory with a Makefile
pub fn create_makefile_project(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("Makefile"), content).expect("Failed to write Makefile");
    let path = dir.path().canonicalize().expect("Failed to canonicalize temp dir");
    (dir, path)
}

/// Config serving the makefile in `dir`
pub fn config_for(dir: &Path) -> Config {
    let mut config = Config::default();
    config.server.working_dir = dir.display().to_string();
    config
}

/// Context serving the makefile in `dir`
pub fn context_for(dir: &Path) -> Arc<ServerContext> {
    Arc::new(ServerContext::from_config(&config_for(dir)).expect("Failed to build context"))
}

/// Whether GNU make (or any `make`) is installed
pub fn make_available() -> bool {
    which::which("make").is_ok()
}

/// Executor that records calls and never spawns anything
#[derive(Debug, Default, Clone)]
pub struct SpyExecutor {
    calls: Arc<AtomicUsize>,
}

impl SpyExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Execute for SpyExecutor {
    async fn execute(&self, spec: &ExecSpec) -> Result<ExecutionResult, GateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutionResult {
            exit_code: 0,
            output: format!("ran {}\n", spec.target),
            truncated: false,
            timed_out: false,
            duration: Duration::from_millis(1),
            state: RunState::Completed,
            pid: None,
        })
    }
}

/// Whether `pid` names a live process; zombies count as dead
pub fn process_alive(pid: i32) -> bool {
    let status = Path::new("/proc").join(pid.to_string()).join("stat");
    if let Ok(stat) = std::fs::read_to_string(&status) {
        // State follows the parenthesized command name
        return match stat.rsplit_once(')') {
            Some((_, rest)) => !matches!(rest.trim_start().chars().next(), Some('Z') | Some('X')),
            None => true,
        };
    }

    if Path::new("/proc/self").exists() {
        return false;
    }

    #[cfg(unix)]
    {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Poll until `pid` is gone or `limit` passes
pub fn wait_for_exit(pid: i32, limit: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if !process_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    !process_alive(pid)
}

/// Sample Makefile content for testing
pub const SAMPLE_MAKEFILE: &str = "\
.PHONY: build test lint clean

build: ## Build the project
\t@echo building

test: build ## Run the tests
\t@echo testing

lint:
\t@echo linting

clean: ## Remove build output
\t@echo cleaning
";
