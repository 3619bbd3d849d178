/*!
Dispatch runner.

  plan(invocation, assignment, no_paths) -> Vec<Job>
  run_jobs(jobs, mode)                   -> Vec<Outcome>   (blocking; owns a Tokio runtime)
  aggregate_exit_code(&outcomes)         -> i32

Concurrency model:
  - Parallel: every job is spawned as its own Tokio task; the runner then awaits
    every handle, so one failing workspace never cancels another.
  - Sequential: jobs run one at a time in discovery order.
  - Children inherit stdin/stdout/stderr; output interleaving between
    concurrent workspaces is unordered.
  - No timeout, no retries.

Exit-code reduction is a plain max over per-job contributions:
  Exited(0) -> 0, Exited(n > 0) -> n, anything else -> 1.
*/

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use crate::invocation::Invocation;
use crate::routing::{Assignment, NoPathsPolicy};
use crate::{log_debug, log_error, log_info};

/* ---- Data Structures ---- */

/// One command launch in one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub workspace: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

/// How a single job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Exited(i32),
    /// Terminated without an exit code (e.g. killed by a signal).
    Signaled,
    /// The process never started (not found, permission denied, missing cwd...).
    LaunchFailed(String),
}

impl Status {
    /// Contribution to the aggregate exit code.
    pub fn exit_contribution(&self) -> i32 {
        match self {
            Status::Exited(0) => 0,
            Status::Exited(code) if *code > 0 => *code,
            _ => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Exited(0))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Exited(code) => write!(f, "exit {code}"),
            Status::Signaled => f.write_str("terminated by signal"),
            Status::LaunchFailed(msg) => write!(f, "launch failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub workspace: String,
    pub status: Status,
    pub elapsed_ms: u128,
}

/* ---- Planning ---- */

/// Turn the routed assignment into jobs, in discovery order.
pub fn plan(invocation: &Invocation, assignment: &Assignment, no_paths: NoPathsPolicy) -> Vec<Job> {
    assignment
        .eligible(no_paths)
        .map(|ws| Job {
            workspace: ws.workspace.clone(),
            program: invocation.program.clone(),
            args: invocation.exec_args(&ws.args),
            cwd: ws.root.clone(),
        })
        .collect()
}

/* ---- Execution ---- */

/// Run every job to completion and return outcomes in job order.
pub fn run_jobs(jobs: Vec<Job>, mode: ExecutionMode) -> Result<Vec<Outcome>> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    Ok(rt.block_on(run_jobs_async(jobs, mode)))
}

pub async fn run_jobs_async(jobs: Vec<Job>, mode: ExecutionMode) -> Vec<Outcome> {
    match mode {
        ExecutionMode::Sequential => {
            let mut outcomes = Vec::with_capacity(jobs.len());
            for job in jobs {
                outcomes.push(run_one(job).await);
            }
            outcomes
        }
        ExecutionMode::Parallel => {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| {
                    let workspace = job.workspace.clone();
                    (workspace, tokio::spawn(run_one(job)))
                })
                .collect();

            let mut outcomes = Vec::with_capacity(handles.len());
            for (workspace, handle) in handles {
                let outcome = match handle.await {
                    Ok(o) => o,
                    Err(e) => {
                        log_error!("[{workspace}] task aborted: {e}");
                        Outcome {
                            workspace,
                            status: Status::LaunchFailed(format!("task aborted: {e}")),
                            elapsed_ms: 0,
                        }
                    }
                };
                outcomes.push(outcome);
            }
            outcomes
        }
    }
}

async fn run_one(job: Job) -> Outcome {
    let started = Instant::now();
    log_debug!("[{}] $ {} (cwd={})", job.workspace, job, job.cwd.display());

    let result = tokio::process::Command::new(&job.program)
        .args(&job.args)
        .current_dir(&job.cwd)
        .status()
        .await;

    let status = match result {
        Ok(st) => match st.code() {
            Some(code) => Status::Exited(code),
            None => Status::Signaled,
        },
        Err(e) => Status::LaunchFailed(format!("{}: {e}", job.program)),
    };
    let elapsed_ms = started.elapsed().as_millis();

    if status.is_success() {
        log_info!("[{}] done in {elapsed_ms} ms", job.workspace);
    } else {
        log_error!("[{}] {status} after {elapsed_ms} ms", job.workspace);
    }

    Outcome {
        workspace: job.workspace,
        status,
        elapsed_ms,
    }
}

/* ---- Aggregation ---- */

/// Max of all contributions; 0 for an empty run.
pub fn aggregate_exit_code(outcomes: &[Outcome]) -> i32 {
    outcomes
        .iter()
        .map(|o| o.status.exit_contribution())
        .max()
        .unwrap_or(0)
}

/* ---- Tests ---- */
