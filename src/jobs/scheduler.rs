use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

use super::{job::JobKind, runner::JobRunner};
use crate::state::Config;

fn cron_for(config: &Config, kind: JobKind) -> &str {
    match kind {
        JobKind::ProcessDue => &config.process_due_cron,
        JobKind::MarkOverdue => &config.mark_overdue_cron,
        JobKind::CleanupSent => &config.cleanup_sent_cron,
        JobKind::RecomputeUserStats => &config.recompute_stats_cron,
    }
}

/// Registers every job on its cron schedule and starts ticking.
///
/// A failed or skipped run is only logged; the next tick starts over from current state.
pub async fn start_job_scheduler(
    runner: Arc<JobRunner>,
    config: &Config,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    for kind in JobKind::ALL {
        let runner = runner.clone();
        let job = Job::new_async(cron_for(config, kind), move |_uuid, _l| {
            let runner = runner.clone();

            Box::pin(async move {
                match runner.run(kind).await {
                    Ok(summary) if !summary.success => {
                        error!("Scheduled run of {} failed: {:?}", kind, summary.errors);
                    }
                    Ok(_) => {}
                    Err(e) => error!("Scheduled run of {} skipped: {}", kind, e),
                }
            })
        })?;

        scheduler.add(job).await?;
        info!("Scheduled job {} ({})", kind, cron_for(config, kind));
    }

    scheduler.start().await?;

    info!("Job scheduler started");
    Ok(scheduler)
}
