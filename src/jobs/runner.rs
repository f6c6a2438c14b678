use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    cleanup_sent::CleanupSentJob,
    job::{BackgroundJob, JobContext, JobKind, JobSummary},
    mark_overdue::MarkOverdueJob,
    process_due::ProcessDueJob,
    recompute_user_stats::RecomputeUserStatsJob,
};
use crate::error::{AppError, Result};

/// Runs the periodic jobs, never two invocations of the same job at once.
pub struct JobRunner {
    ctx: JobContext,
    jobs: Vec<Arc<dyn BackgroundJob>>,
    running: DashMap<JobKind, DateTime<Utc>>,
}

/// Marks a job as running until dropped.
struct RunGuard<'a> {
    running: &'a DashMap<JobKind, DateTime<Utc>>,
    kind: JobKind,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.remove(&self.kind);
    }
}

impl JobRunner {
    pub fn new(ctx: JobContext) -> Self {
        Self::with_jobs(
            ctx,
            vec![
                Arc::new(ProcessDueJob::default()),
                Arc::new(MarkOverdueJob),
                Arc::new(CleanupSentJob::default()),
                Arc::new(RecomputeUserStatsJob),
            ],
        )
    }

    pub fn with_jobs(ctx: JobContext, jobs: Vec<Arc<dyn BackgroundJob>>) -> Self {
        Self {
            ctx,
            jobs,
            running: DashMap::new(),
        }
    }

    fn acquire(&self, kind: JobKind) -> Result<RunGuard<'_>> {
        match self.running.entry(kind) {
            Entry::Occupied(entry) => {
                return Err(AppError::JobAlreadyRunning(format!(
                    "{} started at {}",
                    kind,
                    entry.get()
                )));
            }
            Entry::Vacant(entry) => {
                entry.insert(self.ctx.clock.now());
            }
        }

        Ok(RunGuard {
            running: &self.running,
            kind,
        })
    }

    /// Runs one job to completion and reports how it went.
    ///
    /// `Err` only when the job cannot start (unknown or already running). A run
    /// whose candidate query or commit failed still yields a summary, with
    /// `success == false` and the cause in `errors`. Per-candidate failures are
    /// listed in `errors` of a successful summary.
    pub async fn run(&self, kind: JobKind) -> Result<JobSummary> {
        let job = self
            .jobs
            .iter()
            .find(|job| job.kind() == kind)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Job {} is not registered", kind)))?;

        let _guard = self.acquire(kind)?;
        let started_at = self.ctx.clock.now();
        info!("Job {} started", kind);

        let summary = match job.execute(&self.ctx).await {
            Ok(outcome) => {
                info!(
                    "Job {} finished: {} processed, {} errors",
                    kind,
                    outcome.count,
                    outcome.errors.len()
                );
                JobSummary {
                    job: kind,
                    success: true,
                    count: outcome.count,
                    errors: outcome.errors,
                    started_at,
                    finished_at: self.ctx.clock.now(),
                }
            }
            Err(e) => {
                if e.is_transient() {
                    warn!("Job {} failed, retrying on next tick: {}", kind, e);
                } else {
                    error!("Job {} failed: {}", kind, e);
                }
                JobSummary {
                    job: kind,
                    success: false,
                    count: 0,
                    errors: vec![e.to_string()],
                    started_at,
                    finished_at: self.ctx.clock.now(),
                }
            }
        };

        Ok(summary)
    }
}
