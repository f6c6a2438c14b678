//! Rebuilds the task counters stored on every user.

use async_trait::async_trait;
use tracing::{info, warn};

use super::job::{BackgroundJob, JobContext, JobKind, JobOutcome};
use crate::{batch_writer::BatchWriter, error::Result, store::WriteOp, user::UserStats};

pub struct RecomputeUserStatsJob;

#[async_trait]
impl BackgroundJob for RecomputeUserStatsJob {
    fn kind(&self) -> JobKind {
        JobKind::RecomputeUserStats
    }

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutcome> {
        let now = ctx.clock.now();
        let user_ids = ctx.store.list_user_ids().await?;

        let mut writer = BatchWriter::new(ctx.store.clone());
        let mut outcome = JobOutcome::default();

        for user_id in user_ids {
            let lookup = ctx.store.find_tasks_for_user(user_id);
            let tasks = match tokio::time::timeout(ctx.lookup_timeout, lookup).await {
                Ok(Ok(tasks)) => tasks,
                Ok(Err(e)) => {
                    warn!("Failed to load tasks for user {}: {}", user_id, e);
                    outcome.errors.push(format!("{}: {}", user_id, e));
                    continue;
                }
                Err(_) => {
                    warn!("Loading tasks for user {} timed out", user_id);
                    outcome.errors.push(format!(
                        "{}: task lookup timed out after {}ms",
                        user_id,
                        ctx.lookup_timeout.as_millis()
                    ));
                    continue;
                }
            };

            writer
                .push(WriteOp::UpdateUserStats {
                    user_id,
                    stats: UserStats::from_tasks(&tasks),
                    last_active_at: now,
                })
                .await?;
            outcome.count += 1;
        }

        writer.finish().await?;
        info!("Recomputed stats for {} users", outcome.count);

        Ok(outcome)
    }
}
