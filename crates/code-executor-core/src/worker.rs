//! One isolated worker process per execution
//!
//! A worker is a fresh interpreter process that runs exactly one submission.
//! It gets its own process group, rlimits, scratch directory and pipes, and
//! is killed (with its whole group) before the result is returned.

use crate::capture::OutputCapture;
use crate::classify::{Outcome, ResultClassifier};
use crate::guard::{ProcessGroup, TimeoutGuard};
use crate::isolation::pipe::{ChildPipes, WorkerPipes, install_fd};
use crate::isolation::{ResourceLimiter, RestrictedEnvironment};
use crate::protocol::{MAX_REPORT_BYTES, REPORT_FD, ReportRead};
use crate::{ExecutionRequest, ExecutionResult, ExecutorConfig, ExecutorError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Not started yet
    Pending,
    /// Interpreter process is alive
    Running,
    /// Process group is gone and the result is classified
    Finished,
}

/// Everything a worker borrows from its executor
#[derive(Debug, Clone, Copy)]
pub struct WorkerSpec<'a> {
    pub config: &'a ExecutorConfig,
    pub environment: &'a RestrictedEnvironment,
    pub limiter: ResourceLimiter,
    pub classifier: ResultClassifier,
}

#[derive(Debug)]
pub struct Worker {
    pub id: u64,
    pub state: WorkerState,
    pub pid: Option<u32>,
}

impl Worker {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self {
            id,
            state: WorkerState::Pending,
            pid: None,
        }
    }

    /// Run one submission to completion, timeout or fault
    pub async fn run(
        &mut self,
        spec: WorkerSpec<'_>,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult> {
        if self.state != WorkerState::Pending {
            return Err(ExecutorError::Supervise(format!(
                "worker {} already used (state: {:?})",
                self.id, self.state
            )));
        }

        let started = Instant::now();
        let scratch = scratch_dir(spec.config)?;

        let (supervisor, child_pipes) = WorkerPipes::new()?.split();
        let mut child = spawn(spec, &child_pipes, scratch.path())?;
        // the worker now holds the only write ends
        drop(child_pipes);

        self.pid = child.id();
        self.state = WorkerState::Running;
        let group = ProcessGroup::of(&child).ok_or_else(|| {
            ExecutorError::Supervise("worker exited before it could be tracked".into())
        })?;

        tracing::info!(
            worker_id = self.id,
            pid = group.id(),
            timeout_secs = request.timeout_secs(),
            code_len = request.code.len(),
            "worker spawned"
        );

        let (output_rx, report_rx) = supervisor.into_receivers()?;
        let output = OutputCapture::new(spec.config.max_output_bytes);
        let output_reader = output.spawn_reader(output_rx);
        let report = OutputCapture::new(usize::try_from(MAX_REPORT_BYTES).unwrap_or(usize::MAX));
        let report_reader = report.spawn_reader(report_rx);
        let feeder = tokio::spawn(feed(child.stdin.take(), request.code.clone()));

        let guard = TimeoutGuard::new(request.timeout, started);
        let watched = guard.watch(&mut child, group).await;
        let elapsed = started.elapsed();

        // stragglers in the group would keep the pipes open
        if let Err(e) = group.kill() {
            tracing::warn!(worker_id = self.id, error = %e, "failed to kill worker group");
        }
        feeder.abort();
        let outcome = watched?;

        let grace = spec.config.drain_grace;
        drain(self.id, "output", output_reader, grace).await;
        drain(self.id, "report", report_reader, grace).await;
        self.state = WorkerState::Finished;

        let result = spec.classifier.classify(Outcome {
            guard: outcome,
            report: ReportRead::from_capture(&report.contents(), report.overflowed()),
            output: output.snapshot(),
            elapsed,
            timeout_secs: request.timeout_secs(),
        });

        tracing::info!(
            worker_id = self.id,
            status = ?result.status,
            elapsed_ms = result.execution_time_ms,
            output_bytes = output.total_bytes(),
            "worker finished"
        );

        Ok(result)
    }
}

fn spawn(spec: WorkerSpec<'_>, pipes: &ChildPipes, workdir: &Path) -> Result<Child> {
    let (stdout, stderr) = pipes.stdio()?;
    let report_fd = pipes.report_fd();
    let limiter = spec.limiter;

    let mut cmd = Command::new(&spec.config.python_path);
    cmd.args(spec.environment.interpreter_args())
        .env_clear()
        .envs(spec.config.env.iter().map(|(k, v)| (k, v)))
        .env("HOME", workdir)
        .env("TMPDIR", workdir)
        .current_dir(workdir)
        .stdin(Stdio::piped())
        .stdout(stdout)
        .stderr(stderr)
        .process_group(0)
        .kill_on_drop(true);

    // SAFETY: the hook only calls dup2, fcntl and setrlimit, all async-signal-safe
    unsafe {
        cmd.pre_exec(move || {
            install_fd(report_fd, REPORT_FD)?;
            limiter.apply()
        });
    }

    // dropping `cmd` here closes the parent's copies of stdout/stderr
    cmd.spawn().map_err(ExecutorError::Spawn)
}

fn scratch_dir(config: &ExecutorConfig) -> Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("code-executor-");
    let dir = match &config.scratch_root {
        Some(root) => builder.tempdir_in(root)?,
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Write the submission to the worker's stdin and close it
async fn feed(stdin: Option<ChildStdin>, code: String) {
    let Some(mut stdin) = stdin else {
        return;
    };
    if let Err(e) = stdin.write_all(code.as_bytes()).await {
        // the worker may die before reading everything
        tracing::debug!(error = %e, "failed to write submission to worker");
    }
}

/// Give a reader `grace` to reach EOF, then stop it
async fn drain(
    worker_id: u64,
    stream: &'static str,
    mut reader: JoinHandle<std::io::Result<()>>,
    grace: Duration,
) {
    match tokio::time::timeout(grace, &mut reader).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => {
            tracing::warn!(worker_id, stream, error = %e, "capture read failed");
        }
        Ok(Err(e)) => {
            tracing::warn!(worker_id, stream, error = %e, "capture task failed");
        }
        Err(_) => {
            tracing::warn!(worker_id, stream, "capture still open after grace period");
            reader.abort();
        }
    }
}
