//! Hard-deletes delivered or dead-lettered notifications past their retention period.

use async_trait::async_trait;
use chrono::Duration;
use tracing::info;

use super::job::{BackgroundJob, JobContext, JobKind, JobOutcome};
use crate::{batch_writer::BatchWriter, error::Result, store::WriteOp};

pub const SENT_RETENTION_DAYS: i64 = 30;
pub const CLEANUP_BATCH_LIMIT: usize = 1000;

pub struct CleanupSentJob {
    retention: Duration,
    batch_limit: usize,
}

impl Default for CleanupSentJob {
    fn default() -> Self {
        Self {
            retention: Duration::days(SENT_RETENTION_DAYS),
            batch_limit: CLEANUP_BATCH_LIMIT,
        }
    }
}

#[async_trait]
impl BackgroundJob for CleanupSentJob {
    fn kind(&self) -> JobKind {
        JobKind::CleanupSent
    }

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutcome> {
        let cutoff = ctx.clock.now() - self.retention;
        let expired = ctx.store.find_sent_before(cutoff, self.batch_limit).await?;

        let mut writer = BatchWriter::new(ctx.store.clone());
        for notification in &expired {
            writer
                .push(WriteOp::DeleteNotification {
                    id: notification.id.clone(),
                })
                .await?;
        }
        let summary = writer.finish().await?;

        if summary.operations > 0 {
            info!(
                "Deleted {} sent notifications older than {} days",
                summary.operations,
                self.retention.num_days()
            );
        }

        Ok(JobOutcome {
            count: summary.operations,
            errors: Vec::new(),
        })
    }
}
