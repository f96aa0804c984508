//! External-process capability.
//!
//! Every tool the pipeline runs goes through [`ProcessRunner::run`], so tests
//! can substitute a fake that records [`Invocation`]s and fabricates output
//! files instead of spawning a real TeX installation.
//!
//! [`SystemProcessRunner`] is the real implementation: `tokio::process` with
//! a bounded wait. A child that outlives the wait is killed (`kill_on_drop`)
//! and reported as [`ProcessOutcome::TimedOut`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Bytes of stderr kept for diagnostics.
const STDERR_LIMIT: usize = 4096;

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable to start, normally the path the tool locator resolved.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub working_dir: PathBuf,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, vars: Vec<(String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    /// The program's file stem (`convert` for `/usr/bin/convert`), used to
    /// name the tool in failures and log lines.
    pub fn tool_name(&self) -> &str {
        std::path::Path::new(&self.program)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.program)
    }

    /// Shell-like rendering for log lines.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited on its own. `code` is `None` when it was killed by
    /// a signal.
    Exited { code: Option<i32>, stderr: String },
    /// The bounded wait elapsed first; the process was killed.
    TimedOut,
}

impl ProcessOutcome {
    /// True for a clean exit with status 0.
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Exited { code: Some(0), .. })
    }
}

/// Runs external programs to completion or timeout.
///
/// `Err` means the program could not be started at all.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> std::io::Result<ProcessOutcome>;
}

/// [`ProcessRunner`] that spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> std::io::Result<ProcessOutcome> {
        debug!(
            "Running `{}` in {}",
            invocation.command_line(),
            invocation.working_dir.display()
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;

        // Dropping the `wait_with_output` future on timeout drops the child,
        // which kills it.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if stderr.len() > STDERR_LIMIT {
                    let mut cut = STDERR_LIMIT;
                    while !stderr.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    stderr.truncate(cut);
                }
                Ok(ProcessOutcome::Exited {
                    code: output.status.code(),
                    stderr,
                })
            }
            Err(_) => Ok(ProcessOutcome::TimedOut),
        }
    }
}
