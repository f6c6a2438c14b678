//! Flags open tasks whose deadline has passed and queues an overdue alert for each.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

use super::job::{BackgroundJob, JobContext, JobKind, JobOutcome};
use crate::{
    batch_writer::BatchWriter,
    error::Result,
    notification::{NotificationPayload, NotificationType, ScheduledNotification},
    store::WriteOp,
    task::TaskRecord,
};

pub struct MarkOverdueJob;

fn overdue_alert(
    task: &TaskRecord,
    due_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ScheduledNotification {
    let mut data = HashMap::new();
    data.insert("taskId".to_string(), task.id.to_string());
    data.insert("type".to_string(), NotificationType::OverdueAlert.to_string());

    ScheduledNotification {
        id: ScheduledNotification::overdue_id(task.id, due_time),
        user_id: task.user_id,
        task_id: task.id,
        notification_type: NotificationType::OverdueAlert,
        scheduled_for: now,
        payload: NotificationPayload {
            title: "Task Overdue".to_string(),
            body: format!("\"{}\" is past its due time", task.title),
            data,
            icon: Some(crate::notification::notification_planner::REMINDER_ICON.to_string()),
        },
        sent: false,
        sent_at: None,
        error: None,
        retry_count: 0,
        created_at: now,
    }
}

#[async_trait]
impl BackgroundJob for MarkOverdueJob {
    fn kind(&self) -> JobKind {
        JobKind::MarkOverdue
    }

    async fn execute(&self, ctx: &JobContext) -> Result<JobOutcome> {
        let now = ctx.clock.now();
        let candidates = ctx.store.find_overdue_candidates(now).await?;

        let mut writer = BatchWriter::new(ctx.store.clone());
        let mut outcome = JobOutcome::default();

        for task in candidates.iter().filter(|task| task.status.is_active()) {
            let Some(due_time) = task.due_time else {
                continue;
            };
            writer
                .push(WriteOp::MarkTaskOverdue {
                    task_id: task.id,
                    updated_at: now,
                })
                .await?;
            writer
                .push(WriteOp::SetNotification(overdue_alert(task, due_time, now)))
                .await?;
            outcome.count += 1;
        }

        writer.finish().await?;
        if outcome.count > 0 {
            info!("Marked {} tasks as overdue", outcome.count);
        }

        Ok(outcome)
    }
}
