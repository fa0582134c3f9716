//! Sync Engine - Orchestrates sequential repository updates
//!
//! Walks the remote listing page by page, looks up each repository's
//! working copy and runs the update command for the ones present locally.
//! A failed listing request ends the run; a failed update only marks that
//! repository as failed and the loop moves on.

use crate::discovery::{list_all, RepoDescriptor, RepoSource};
use crate::git::{GitClient, SyncOutcome, NOT_PRESENT};
use crate::local::{LocalCopy, LocalResolver};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Console side of a run
pub trait Reporter: Send + Sync {
    /// A listed repository has no local working copy
    fn missing(&self, repo: &RepoDescriptor);

    /// A working copy was found and is about to be updated
    fn updating(&self, repo: &RepoDescriptor, path: &Path);

    /// One line of update command output
    fn output_line(&self, repo: &str, line: &str);
}

/// Writes progress to stdout as it happens
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn missing(&self, repo: &RepoDescriptor) {
        println!("{} does not exist", repo.full_name);
    }

    fn updating(&self, _repo: &RepoDescriptor, path: &Path) {
        println!("{}", path.display());
    }

    fn output_line(&self, _repo: &str, line: &str) {
        println!("{}", line);
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub duration: Duration,
    pub results: Vec<(String, SyncOutcome)>,
}

impl SyncSummary {
    fn record(&mut self, full_name: String, outcome: SyncOutcome) {
        self.total_repositories += 1;
        match &outcome {
            SyncOutcome::Updated { .. } => self.updated += 1,
            SyncOutcome::Skipped { .. } => self.skipped += 1,
            SyncOutcome::Failed { .. } => self.failed += 1,
        }
        self.results.push((full_name, outcome));
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Failed repositories with their outcome, in processing order
    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncOutcome)> {
        self.results
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SyncOutcome::Failed { .. }))
            .map(|(name, outcome)| (name.as_str(), outcome))
    }
}

/// The main sync engine that drives listing, resolution and updates
pub struct SyncEngine {
    source: Box<dyn RepoSource>,
    resolver: LocalResolver,
    git_client: GitClient,
    reporter: Arc<dyn Reporter>,
    dry_run: bool,
}

impl SyncEngine {
    pub fn new(
        source: Box<dyn RepoSource>,
        resolver: LocalResolver,
        git_client: GitClient,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            source,
            resolver,
            git_client,
            reporter,
            dry_run: false,
        }
    }

    /// Resolve repositories without running the update command
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run a complete sync: list every repository and update the local ones.
    ///
    /// Repositories are processed one at a time in listing order. Returns an
    /// error only when the listing itself fails.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<SyncSummary> {
        let start_time = Instant::now();
        let mut summary = SyncSummary::default();

        info!(
            "Syncing {} repositories into {}{}",
            self.source.provider_name(),
            self.resolver.base_directory().display(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        let repositories = list_all(self.source.as_ref());
        futures::pin_mut!(repositories);

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    summary.cancelled = true;
                    break;
                }
                next = repositories.next() => next,
            };

            let Some(repo) = next else {
                break;
            };
            let repo = repo.context("Failed to list repositories")?;

            let outcome = self.sync_repository(&repo, &mut shutdown).await;
            let cancelled = outcome.is_cancelled();
            summary.record(repo.full_name, outcome);

            if cancelled {
                summary.cancelled = true;
                break;
            }
        }

        summary.duration = start_time.elapsed();

        info!(
            "Sync finished in {:.2}s: {} updated, {} skipped, {} failed",
            summary.duration.as_secs_f64(),
            summary.updated,
            summary.skipped,
            summary.failed
        );
        for (name, outcome) in summary.failures() {
            if let SyncOutcome::Failed { stage, error } = outcome {
                warn!("  {} ({}): {}", name, stage, error);
            }
        }
        if summary.cancelled {
            warn!("Sync interrupted after {} repositories", summary.total_repositories);
        }

        Ok(summary)
    }

    /// Resolve and, if present locally, update a single repository
    async fn sync_repository(
        &self,
        repo: &RepoDescriptor,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SyncOutcome {
        let path = match self.resolver.resolve(repo) {
            LocalCopy::Present(path) => path,
            LocalCopy::Absent(path) => {
                debug!("No working copy at {}", path.display());
                self.reporter.missing(repo);
                return SyncOutcome::skipped(NOT_PRESENT);
            }
            LocalCopy::Unreadable { path, error } => {
                warn!("Cannot inspect {} for {}: {}", path.display(), repo, error);
                return SyncOutcome::skipped(format!("unreadable: {}", error));
            }
            LocalCopy::Invalid { reason } => {
                warn!("Skipping {}: {}", repo, reason);
                return SyncOutcome::skipped(reason);
            }
        };

        self.reporter.updating(repo, &path);

        if self.dry_run {
            info!("Would update {}", repo);
            return SyncOutcome::skipped("dry run");
        }

        let outcome = self.git_client.update(repo, &path, shutdown).await;
        match &outcome {
            SyncOutcome::Updated { lines, .. } => {
                info!("Updated {} ({} lines of output)", repo, lines)
            }
            SyncOutcome::Failed { stage, error } => {
                error!("Failed to update {} ({}): {}", repo, stage, error)
            }
            SyncOutcome::Skipped { .. } => {}
        }

        outcome
    }
}

/// Create the signal used to interrupt a run
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves once shutdown has been requested; never resolves if the sender is gone
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Request shutdown on Ctrl+C; a second Ctrl+C exits immediately with 130
pub fn spawn_ctrl_c_handler(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                return;
            }

            if request_shutdown(&shutdown) {
                info!("Interrupt received, stopping...");
            } else {
                warn!("Second interrupt received, exiting now");
                std::process::exit(130);
            }
        }
    });
}

/// Flag the run as interrupted; false if it already was
fn request_shutdown(shutdown: &watch::Sender<bool>) -> bool {
    shutdown.send_if_modified(|stop| !std::mem::replace(stop, true))
}
