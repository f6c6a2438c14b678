use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::notification_models::{
    NotificationPayload, NotificationStats, NotificationType, ScheduledNotification,
};
use crate::{
    batch_writer::{BatchWriter, MAX_BATCH_OPERATIONS},
    clock::Clock,
    error::{AppError, Result},
    store::{Store, WriteOp},
    task::TaskRecord,
};

/// Lead times used when the caller does not choose any: a day, an hour, a quarter hour.
pub const DEFAULT_REMINDER_OFFSETS: [i64; 3] = [1440, 60, 15];

pub const REMINDER_ICON: &str = "/icons/icon-192x192.png";

/// Turns task deadlines into persisted reminder events and removes them again.
#[derive(Clone)]
pub struct NotificationPlanner {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl NotificationPlanner {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Builds the reminders for `task` without writing anything.
    ///
    /// Offsets are validated up front, so a bad request fails before any commit.
    /// Reminders that would fire at or before `now` are left out.
    fn plan_reminders(
        &self,
        task: &TaskRecord,
        offsets: &[i64],
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledNotification>> {
        if let Some(bad) = offsets.iter().find(|offset| **offset < 0) {
            return Err(AppError::Validation(format!(
                "Reminder offset must not be negative: {}",
                bad
            )));
        }
        let offsets: BTreeSet<i64> = offsets.iter().copied().collect();
        if offsets.len() > MAX_BATCH_OPERATIONS {
            return Err(AppError::Validation(format!(
                "At most {} reminder offsets per task",
                MAX_BATCH_OPERATIONS
            )));
        }

        let Some(due_time) = task.due_time else {
            return Ok(Vec::new());
        };

        let mut planned = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let scheduled_for = Duration::try_minutes(offset)
                .and_then(|lead| due_time.checked_sub_signed(lead))
                .ok_or_else(|| {
                    AppError::Validation(format!("Reminder offset out of range: {}", offset))
                })?;
            if scheduled_for <= now {
                debug!(
                    "Skipping {} minute reminder for task {}: already past",
                    offset, task.id
                );
                continue;
            }

            planned.push(ScheduledNotification {
                id: ScheduledNotification::reminder_id(task.id, offset),
                user_id: task.user_id,
                task_id: task.id,
                notification_type: NotificationType::DeadlineReminder,
                scheduled_for,
                payload: reminder_payload(task, offset),
                sent: false,
                sent_at: None,
                error: None,
                retry_count: 0,
                created_at: now,
            });
        }

        Ok(planned)
    }

    /// Upserts one deadline reminder per offset that still lies in the future.
    ///
    /// Returns the number of reminders written. A task without a due time is a no-op.
    /// All reminders for the call go out in a single commit.
    pub async fn schedule_for_task(&self, task: &TaskRecord, offsets: &[i64]) -> Result<usize> {
        let planned = self.plan_reminders(task, offsets, self.clock.now())?;

        let mut writer = BatchWriter::new(self.store.clone());
        for notification in planned {
            writer.push(WriteOp::SetNotification(notification)).await?;
        }

        let summary = writer.finish().await?;
        if summary.operations > 0 {
            info!(
                "Scheduled {} reminders for task {}",
                summary.operations, task.id
            );
        }

        Ok(summary.operations)
    }

    /// Deletes every not-yet-sent event for the task. Returns how many were removed.
    pub async fn cancel_for_task(&self, user_id: Uuid, task_id: Uuid) -> Result<usize> {
        let pending = self.store.find_pending_for_task(user_id, task_id).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut writer = BatchWriter::new(self.store.clone());
        for notification in pending {
            writer
                .push(WriteOp::DeleteNotification {
                    id: notification.id,
                })
                .await?;
        }
        let summary = writer.finish().await?;
        info!(
            "Cancelled {} pending notifications for task {}",
            summary.operations, task_id
        );

        Ok(summary.operations)
    }

    /// Deadline changed: replace what is pending with a plan from the new due time.
    ///
    /// Stale deletes and new upserts share one writer, so a reschedule below the
    /// batch ceiling lands as a single commit. Returns the number of reminders written.
    pub async fn reschedule_for_task(&self, task: &TaskRecord, offsets: &[i64]) -> Result<usize> {
        let planned = self.plan_reminders(task, offsets, self.clock.now())?;
        let pending = self.store.find_pending_for_task(task.user_id, task.id).await?;

        let keep: HashSet<&str> = planned.iter().map(|n| n.id.as_str()).collect();
        let mut writer = BatchWriter::new(self.store.clone());
        let mut removed = 0;
        for stale in pending.iter().filter(|n| !keep.contains(n.id.as_str())) {
            writer
                .push(WriteOp::DeleteNotification {
                    id: stale.id.clone(),
                })
                .await?;
            removed += 1;
        }

        let scheduled = planned.len();
        for notification in planned {
            writer.push(WriteOp::SetNotification(notification)).await?;
        }
        writer.finish().await?;

        info!(
            "Rescheduled task {}: {} reminders planned, {} stale removed",
            task.id, scheduled, removed
        );
        Ok(scheduled)
    }

    pub async fn notification_stats(&self, user_id: Uuid) -> Result<NotificationStats> {
        let notifications = self.store.find_notifications_for_user(user_id).await?;
        Ok(NotificationStats::from_notifications(&notifications))
    }
}

fn reminder_payload(task: &TaskRecord, offset_minutes: i64) -> NotificationPayload {
    let mut data = HashMap::new();
    data.insert("taskId".to_string(), task.id.to_string());
    data.insert("type".to_string(), NotificationType::DeadlineReminder.to_string());
    data.insert("offsetMinutes".to_string(), offset_minutes.to_string());

    NotificationPayload {
        title: "Task Reminder".to_string(),
        body: format!("\"{}\" is due {}", task.title, lead_time_phrase(offset_minutes)),
        data,
        icon: Some(REMINDER_ICON.to_string()),
    }
}

/// Human phrasing of a lead time: minutes below an hour, hours below a day, then days.
pub fn lead_time_phrase(offset_minutes: i64) -> String {
    match offset_minutes {
        0 => "now".to_string(),
        1 => "in 1 minute".to_string(),
        m if m < 60 => format!("in {} minutes", m),
        m if m < 120 => "in 1 hour".to_string(),
        m if m < 1440 => format!("in {} hours", m / 60),
        m if m < 2880 => "tomorrow".to_string(),
        m => format!("in {} days", m / 1440),
    }
}
