use std::fmt;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::Config;
use crate::discovery::RepoDescriptor;
use crate::sync::{shutdown_requested, Reporter};

/// Skip reason for repositories without a working copy
pub const NOT_PRESENT: &str = "not present locally";

/// Where an update went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The update command could not be started
    Spawn,
    /// Its standard output could not be attached
    Output,
    /// Waiting for the process failed
    Wait,
    /// It ran but exited unsuccessfully
    Exit,
    /// It ran longer than the configured timeout and was killed
    Timeout,
    /// The run was interrupted while it was running
    Cancelled,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FailureStage::Spawn => "spawn",
            FailureStage::Output => "output",
            FailureStage::Wait => "wait",
            FailureStage::Exit => "exit",
            FailureStage::Timeout => "timeout",
            FailureStage::Cancelled => "cancelled",
        };
        f.write_str(stage)
    }
}

/// Result of processing one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing was run for this repository
    Skipped { reason: String },
    /// The update command exited successfully
    Updated { status: ExitStatus, lines: usize },
    /// The update did not complete
    Failed { stage: FailureStage, error: String },
}

impl SyncOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        SyncOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(stage: FailureStage, error: impl Into<String>) -> Self {
        SyncOutcome::Failed {
            stage,
            error: error.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Failed {
                stage: FailureStage::Cancelled,
                ..
            }
        )
    }
}

/// How the child process finished
enum Finish {
    Exited(io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Runs the update command inside working copies
#[derive(Clone)]
pub struct GitClient {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    output_grace: Duration,
    reporter: Arc<dyn Reporter>,
}

impl GitClient {
    /// Create a client running `sync.command sync.args... <clone_url>`
    pub fn new(config: &Config, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            program: config.sync.command.clone(),
            args: config.sync.args.clone(),
            timeout: Duration::from_secs(config.sync.timeout),
            output_grace: Duration::from_secs(config.sync.output_grace),
            reporter,
        }
    }

    /// Update the working copy at `path` from `repo.clone_url`.
    ///
    /// Standard output is relayed line by line while the command runs;
    /// standard error is inherited. The process working directory is never
    /// touched; the command gets `path` as its own working directory.
    /// Every failure is reported as a [`SyncOutcome::Failed`] for this
    /// repository only.
    pub async fn update(
        &self,
        repo: &RepoDescriptor,
        path: &Path,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SyncOutcome {
        debug!(
            "Running {} {} {} in {}",
            self.program,
            self.args.join(" "),
            repo.clone_url,
            path.display()
        );

        let mut command = AsyncCommand::new(&self.program);
        command
            .args(&self.args)
            .arg(&repo.clone_url)
            .current_dir(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return SyncOutcome::failed(
                    FailureStage::Spawn,
                    format!("Failed to start {}: {}", self.program, e),
                )
            }
        };

        let Some(stdout) = child.stdout.take() else {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {} for {}: {}", self.program, repo, e);
            }
            return SyncOutcome::failed(
                FailureStage::Output,
                format!("Failed to attach to the output of {}", self.program),
            );
        };

        let mut relay = tokio::spawn(relay_lines(
            stdout,
            self.reporter.clone(),
            repo.full_name.clone(),
        ));

        let finish = tokio::select! {
            status = child.wait() => Finish::Exited(status),
            _ = tokio::time::sleep(self.timeout) => Finish::TimedOut,
            _ = shutdown_requested(shutdown) => Finish::Cancelled,
        };

        if !matches!(finish, Finish::Exited(_)) {
            // kill() also reaps the child
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {} for {}: {}", self.program, repo, e);
            }
        }

        let lines = match tokio::time::timeout(self.output_grace, &mut relay).await {
            Ok(Ok(Ok(lines))) => lines,
            Ok(Ok(Err(e))) => {
                warn!("Lost output of {} for {}: {}", self.program, repo, e);
                0
            }
            Ok(Err(e)) => {
                warn!("Output relay for {} failed: {}", repo, e);
                0
            }
            Err(_) => {
                warn!("Output of {} for {} is still open, abandoning it", self.program, repo);
                relay.abort();
                0
            }
        };

        match finish {
            Finish::Exited(Ok(status)) if status.success() => {
                SyncOutcome::Updated { status, lines }
            }
            Finish::Exited(Ok(status)) => SyncOutcome::failed(
                FailureStage::Exit,
                format!("{} exited with {}", self.program, status),
            ),
            Finish::Exited(Err(e)) => SyncOutcome::failed(
                FailureStage::Wait,
                format!("Failed to wait for {}: {}", self.program, e),
            ),
            Finish::TimedOut => SyncOutcome::failed(
                FailureStage::Timeout,
                format!(
                    "{} did not finish within {}s and was killed",
                    self.program,
                    self.timeout.as_secs()
                ),
            ),
            Finish::Cancelled => {
                SyncOutcome::failed(FailureStage::Cancelled, "Interrupted before completion")
            }
        }
    }
}

/// Copy `reader` to the reporter one line at a time, returning the line count
async fn relay_lines<R>(reader: R, reporter: Arc<dyn Reporter>, repo: String) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        reporter.output_line(&repo, line.trim_end_matches(|c| c == '\n' || c == '\r'));
        count += 1;
    }

    Ok(count)
}
